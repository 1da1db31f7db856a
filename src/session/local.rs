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

use std::io::{self, IsTerminal as _};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::Context as _;
use crossterm::terminal;

use super::{SessionEvent, SessionExit, SessionHandle, SessionId, Shared, Teardown, run_session};
use crate::editor::{Editor, EditorOptions};

const FALLBACK_WIDTH: u16 = 80;

/// Raw mode for the lifetime of the guard, restored on every exit path.
struct RawModeGuard;

impl RawModeGuard {
    fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

/// Put the terminal back into the mode it had before raw mode was entered.
pub(crate) fn restore_terminal() {
    if let Err(err) = terminal::disable_raw_mode() {
        tracing::warn!(error = %err, "failed to restore terminal mode");
    }
}

pub(super) fn spawn(shared: &Shared) -> anyhow::Result<SessionId> {
    let id = shared.next_id();
    let finished = Arc::new(AtomicBool::new(false));
    let session = shared.clone();
    let done = Arc::clone(&finished);

    // Hold the table across spawn so the entry exists before the thread can look for it.
    let mut table = shared.table();
    let thread = thread::Builder::new()
        .name(format!("session-{id}"))
        .spawn(move || run(&session, id, &done))
        .context("failed to spawn local session thread")?;
    table.insert(id, SessionHandle { thread, teardown: Teardown::Terminal { finished } });
    tracing::info!(session = %id, "local session started");
    Ok(id)
}

fn run(shared: &Shared, id: SessionId, finished: &AtomicBool) {
    let exit = {
        let guard = if io::stdin().is_terminal() {
            RawModeGuard::acquire()
                .inspect_err(|err| tracing::warn!(error = %err, "raw mode unavailable, reading cooked input"))
                .ok()
        } else {
            None
        };
        let interactive = guard.is_some();
        let width = if interactive { terminal::size().map_or(FALLBACK_WIDTH, |(cols, _)| cols) } else { 0 };
        let options = EditorOptions {
            interactive,
            telnet: false,
            width: usize::from(width),
            max_line_length: shared.config.max_line_length,
            history_limit: Some(shared.config.local_history_limit),
        };
        let mut editor = Editor::new(id, Box::new(io::stdin()), Box::new(io::stdout()), shared.keymap(), &options);
        if interactive {
            editor.track_width(|| terminal::size().ok().map(|(cols, _)| usize::from(cols)));
            editor.crlf();
        }
        let exit = run_session(&mut editor, &shared.registry, &shared.config.prompt);
        editor.terminate();
        exit
    };
    finished.store(true, Ordering::Release);

    tracing::info!(session = %id, ?exit, "local session ended");
    let event = match exit {
        SessionExit::Shutdown => SessionEvent::QuitRequested { from: id },
        SessionExit::Closed => SessionEvent::SessionEnded { id },
    };
    shared.notify(event);
}
