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

use std::io;

/// Everything that can go wrong while editing a line.
///
/// Buffer, history and completion errors are local: key handlers turn them into a
/// bell and keep reading. `StreamClosed` and `StreamError` end the session.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("line length limit of {limit} characters exceeded")]
    LimitExceeded { limit: usize },

    #[error("range {start}..{end} is invalid for a line of {len} characters")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("history offset {offset} is out of range ({len} entries)")]
    OutOfRange { offset: usize, len: usize },

    #[error("no completion matches the current word")]
    NoCompletionMatch,

    #[error("completion is ambiguous")]
    AmbiguousCompletion,

    #[error("input stream closed")]
    StreamClosed,

    #[error("stream I/O failed: {0}")]
    StreamError(io::Error),
}

impl EditError {
    /// True for the errors that terminate an editor instance.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::StreamClosed | Self::StreamError(_))
    }
}

impl From<io::Error> for EditError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::StreamClosed,
            _ => Self::StreamError(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, EditError>;
