// telline - A readline-style line editor for terminals and telnet sessions
// Copyright (C) 2025  Simon Peter Rothgang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::Cli;
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_PATH_ENV: &str = "TELLINE_CONFIG";
const CONFIG_DIR_NAME: &str = "telline";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_PORT: u16 = 2023;

/// Runtime settings. Built once at startup and handed to the session manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub listen: SocketAddr,
    pub local_enabled: bool,
    pub telnet_enabled: bool,
    pub prompt: String,
    /// 0 = unlimited.
    pub max_line_length: usize,
    /// 0 = unbounded.
    pub local_history_limit: usize,
    pub remote_history_limit: usize,
    /// Telnet clients are assumed to be this wide; the width is not negotiated.
    pub remote_terminal_width: usize,
    pub bind_retry: RetryPolicy,
    pub accept_max_consecutive_failures: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            local_enabled: true,
            telnet_enabled: true,
            prompt: "CLI> ".to_owned(),
            max_line_length: 0,
            local_history_limit: 0,
            remote_history_limit: 5,
            remote_terminal_width: 80,
            bind_retry: RetryPolicy::default(),
            accept_max_consecutive_failures: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    pub delay_ms: u64,
    /// 0 = retry forever.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { delay_ms: 1000, max_attempts: 10 }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Whether another attempt is allowed after `attempts` have failed.
    #[must_use]
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts == 0 || attempts < self.max_attempts
    }
}

impl Config {
    /// File settings (if any) overridden by command-line flags.
    ///
    /// An explicit `--config` or `TELLINE_CONFIG` path must exist; the default
    /// location is optional.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let explicit = cli.config.clone().or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_cli(cli);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(listen) = cli.listen {
            self.listen = listen;
        }
        if cli.no_telnet {
            self.telnet_enabled = false;
        }
        if cli.no_local {
            self.local_enabled = false;
        }
        if let Some(prompt) = &cli.prompt {
            prompt.clone_into(&mut self.prompt);
        }
        if let Some(max) = cli.max_line_length {
            self.max_line_length = max;
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE))
}
