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

pub mod commands;
pub mod config;
pub mod editor;
pub mod error;
pub mod session;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "telline", about = "Line-editing command shell on the local terminal and over telnet", version)]
pub struct Cli {
    /// Address the telnet listener binds to [default: 0.0.0.0:2023]
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Do not accept telnet connections
    #[arg(long)]
    pub no_telnet: bool,

    /// Do not run a session on this terminal
    #[arg(long)]
    pub no_local: bool,

    /// Prompt shown before every line [default: "CLI> "]
    #[arg(long)]
    pub prompt: Option<String>,

    /// Maximum characters per line, 0 for unlimited
    #[arg(long, value_name = "N")]
    pub max_line_length: Option<usize>,

    /// Config file (JSON). Defaults to <config dir>/telline/config.json when present
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}
