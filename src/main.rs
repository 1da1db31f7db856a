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

use anyhow::Context as _;
use clap::Parser;
use telline::Cli;
use telline::commands::Registry;
use telline::config::Config;
use telline::session::{SessionEvent, SessionManager};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(&cli)?;

    let config = Config::load(&cli)?;
    if !config.local_enabled && !config.telnet_enabled {
        anyhow::bail!("both the local session and the telnet listener are disabled");
    }

    let (mut manager, events) = SessionManager::new(config, Registry::builtin());
    if manager.config().telnet_enabled {
        manager.start_telnet()?;
    }
    if manager.config().local_enabled {
        manager.start_local()?;
    }

    while let Ok(event) = events.recv() {
        match event {
            SessionEvent::QuitRequested { from } => {
                tracing::info!(session = %from, "shutdown requested");
                break;
            }
            SessionEvent::SessionEnded { id } if manager.is_local(id) => {
                tracing::info!(session = %id, "local session ended, shutting down");
                break;
            }
            SessionEvent::SessionEnded { id } => {
                tracing::debug!(session = %id, "session ended");
            }
            SessionEvent::AcceptorStopped { reason } => {
                tracing::error!(%reason, "telnet acceptor stopped");
                if !manager.has_local() {
                    break;
                }
            }
        }
    }

    manager.shutdown();
    Ok(())
}

fn setup_tracing(cli: &Cli) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .with_context(|| format!("invalid log level `{}`", cli.log_level))?;

    if let Some(path) = &cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_target(true);
        tracing_subscriber::registry().with(filter).with(file_layer).init();
        tracing::info!(path = %path.display(), "logging to file");
    } else {
        let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        tracing_subscriber::registry().with(filter).with(stderr_layer).init();
    }
    Ok(())
}
