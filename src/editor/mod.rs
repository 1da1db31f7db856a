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

pub mod actions;
pub mod buffer;
pub mod complete;
pub mod history;
pub mod keymap;
pub mod redisplay;

use std::io::{self, BufReader, Read, Write};

use buffer::{Echo, LineBuffer};
use complete::{Completion, CompletionOptions, NameSource};
use history::History;
use keymap::{Key, KeyDecoder, Keymap};
use redisplay::Redisplay;

use crate::error::{EditError, Result};
use crate::session::SessionId;

const BELL: &str = "\x07";

/// Current terminal width in columns, if it can be determined.
pub type WidthSource = Box<dyn Fn() -> Option<usize> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    /// Reading keys for the current line.
    Active,
    /// A line was accepted and handed out; the next `readline` starts another.
    LineReady,
    /// The stream is gone. Absorbing.
    Terminated,
}

/// How an editor instance talks to its stream.
#[derive(Debug, Clone)]
pub struct EditorOptions {
    /// Cursor-addressing terminal on the other end (local tty or telnet client).
    pub interactive: bool,
    /// Swallow telnet commands in the input.
    pub telnet: bool,
    /// Terminal width in columns, 0 if unknown.
    pub width: usize,
    /// 0 means unlimited.
    pub max_line_length: usize,
    /// `None` disables history for this instance.
    pub history_limit: Option<usize>,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self { interactive: false, telnet: false, width: 0, max_line_length: 0, history_limit: Some(0) }
    }
}

/// One line-editing session bound to one input/output pair.
pub struct Editor {
    id: SessionId,
    input: BufReader<Box<dyn Read + Send>>,
    output: Box<dyn Write + Send>,
    buffer: LineBuffer,
    display: Redisplay,
    keymap: Keymap,
    decoder: KeyDecoder,
    history: Option<History>,
    prompt: String,
    state: EditorState,
    line_done: bool,
    end_of_input: bool,
    /// First write failure seen by an output helper; ends the session after dispatch.
    write_error: Option<io::Error>,
    /// Buffer version the terminal shows; `None` forces the next redisplay.
    drawn: Option<u64>,
    width_source: Option<WidthSource>,
}

impl Editor {
    pub fn new(
        id: SessionId,
        input: Box<dyn Read + Send>,
        output: Box<dyn Write + Send>,
        keymap: Keymap,
        options: &EditorOptions,
    ) -> Self {
        Self {
            id,
            input: BufReader::new(input),
            output,
            buffer: LineBuffer::with_limit(options.max_line_length),
            display: Redisplay::new(options.interactive, options.width),
            keymap,
            decoder: KeyDecoder::new(options.telnet),
            history: options.history_limit.map(History::new),
            prompt: String::new(),
            state: EditorState::Active,
            line_done: false,
            end_of_input: false,
            write_error: None,
            drawn: None,
            width_source: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> EditorState {
        self.state
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.display.is_interactive()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.display.width()
    }

    /// Use `width` columns for wrapping from now on. The line is redrawn in full on
    /// the next redisplay.
    pub fn set_width(&mut self, width: usize) {
        if width != self.display.width() {
            tracing::debug!(session = %self.id, width, "terminal width changed");
            self.display.set_width(width);
        }
        self.drawn = None;
    }

    /// Ask `source` for the terminal width before every line.
    pub fn track_width(&mut self, source: impl Fn() -> Option<usize> + Send + 'static) {
        self.width_source = Some(Box::new(source));
    }

    #[must_use]
    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    #[must_use]
    pub fn buffer(&self) -> &LineBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut LineBuffer {
        &mut self.buffer
    }

    #[must_use]
    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    pub fn history_mut(&mut self) -> Option<&mut History> {
        self.history.as_mut()
    }

    #[must_use]
    pub fn snapshot(&self) -> &redisplay::Snapshot {
        self.display.snapshot()
    }

    /// Read one line. `Ok(None)` means the user ended input (Ctrl-D on an empty line).
    /// Stream errors terminate the editor.
    pub fn readline(&mut self, prompt: &str) -> Result<Option<String>> {
        if self.state == EditorState::Terminated {
            return Err(EditError::StreamClosed);
        }
        self.state = EditorState::Active;
        self.line_done = false;
        self.end_of_input = false;
        self.buffer.clear();
        if let Some(history) = self.history.as_mut() {
            history.reset_navigation();
        }
        prompt.clone_into(&mut self.prompt);
        if let Some(width) = self.width_source.as_ref().and_then(|source| source()) {
            self.set_width(width);
        }

        let result = self.run_line();
        if let Err(err) = &result
            && err.is_terminal()
        {
            tracing::debug!(session = %self.id, error = %err, "editor stream ended");
            self.terminate();
        }
        result
    }

    fn run_line(&mut self) -> Result<Option<String>> {
        self.display.start_line(&mut self.output, &self.prompt)?;
        self.drawn = None;
        while !self.line_done {
            let byte = self.read_byte()?;
            if let Some(key) = self.decoder.feed(byte) {
                self.dispatch(key);
            }
            if let Some(err) = self.write_error.take() {
                return Err(err.into());
            }
            self.redisplay()?;
        }

        self.drawn = None;
        if self.end_of_input {
            self.display.finish_line(&mut self.output, "")?;
            self.buffer.clear();
            return Ok(None);
        }
        let shown = self.buffer.display_text().into_owned();
        self.display.finish_line(&mut self.output, &shown)?;
        self.state = EditorState::LineReady;
        Ok(Some(self.buffer.take()))
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0_u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Err(EditError::StreamClosed),
                Ok(_) => return Ok(byte[0]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Run the action bound to `key`, or self-insert printable keys.
    pub fn dispatch(&mut self, key: Key) {
        if let Some(action) = self.keymap.lookup(key) {
            if !action.handle(self, key) {
                self.ding();
            }
            return;
        }
        match key.printable() {
            Some(c) => {
                let mut utf8 = [0_u8; 4];
                if !self.insert_text(c.encode_utf8(&mut utf8)) {
                    self.ding();
                }
            }
            None => {
                tracing::debug!(session = %self.id, ?key, "unbound key");
                self.ding();
            }
        }
    }

    /// Bring the terminal up to date with the buffer.
    pub fn redisplay(&mut self) -> Result<()> {
        if !self.needs_redisplay() {
            return Ok(());
        }
        let shown = self.buffer.display_text().into_owned();
        let point = self.buffer.display_point();
        self.display.render(&mut self.output, &shown, point)?;
        self.drawn = Some(self.buffer.version());
        Ok(())
    }

    /// Whether the buffer changed since it was last drawn.
    #[must_use]
    pub fn needs_redisplay(&self) -> bool {
        self.drawn != Some(self.buffer.version())
    }

    pub fn insert_text(&mut self, text: &str) -> bool {
        self.buffer.insert(text).is_ok()
    }

    pub fn delete_text(&mut self, start: usize, end: usize) -> bool {
        self.buffer.delete(start, end).is_ok()
    }

    /// Replace the whole line, cursor at the end.
    pub fn replace_line(&mut self, text: &str) -> bool {
        self.buffer.set_line(text).is_ok()
    }

    /// Complete the word at the cursor against `names`.
    pub fn complete(&mut self, names: &dyn NameSource, opts: CompletionOptions) -> Result<Completion> {
        complete::complete(&mut self.buffer, names.names(), opts)
    }

    /// Mark the current line as accepted.
    pub fn done(&mut self) {
        self.line_done = true;
    }

    /// End input: `readline` returns `Ok(None)`.
    pub fn end_input(&mut self) {
        self.end_of_input = true;
        self.line_done = true;
    }

    /// Drop the line being edited and start over on a fresh prompt.
    pub fn abandon_line(&mut self) {
        self.move_to_line_end();
        self.print("^C\n");
        self.buffer.clear();
        if let Some(history) = self.history.as_mut() {
            history.reset_navigation();
        }
        self.reset_line_state();
    }

    pub fn disable_echo(&mut self, substitute: Option<char>) {
        self.buffer.set_echo(substitute.map_or(Echo::Hidden, Echo::Masked));
    }

    pub fn enable_echo(&mut self) {
        self.buffer.set_echo(Echo::Enabled);
    }

    pub fn limit_line_length(&mut self, length: usize) {
        self.buffer.set_max_length(length);
    }

    pub fn ding(&mut self) {
        self.write_raw(BELL);
    }

    pub fn crlf(&mut self) {
        self.write_raw("\r\n");
    }

    /// Write command output. Bare newlines become CRLF on interactive streams,
    /// which run without output post-processing.
    pub fn print(&mut self, text: &str) {
        if self.is_interactive() {
            let translated = translate_newlines(text);
            self.write_raw(&translated);
        } else {
            self.write_raw(text);
        }
    }

    /// Put the terminal cursor after the last character of the line, so output
    /// printed next lands below it.
    pub fn move_to_line_end(&mut self) {
        self.drawn = None;
        if let Err(err) = self.display.move_to_end(&mut self.output) {
            self.record_write_error(err);
        }
    }

    /// Redraw prompt and line on the current row, e.g. after listing completions.
    pub fn reset_line_state(&mut self) {
        self.drawn = None;
        let shown = self.buffer.display_text().into_owned();
        let point = self.buffer.display_point();
        if let Err(err) = self.display.redraw(&mut self.output, &shown, point) {
            self.record_write_error(err);
        }
    }

    pub fn clear_screen(&mut self) {
        self.drawn = None;
        let shown = self.buffer.display_text().into_owned();
        let point = self.buffer.display_point();
        if let Err(err) = self.display.clear_screen(&mut self.output, &shown, point) {
            self.record_write_error(err);
        }
    }

    /// Release per-session state. Further `readline` calls fail with `StreamClosed`.
    pub fn terminate(&mut self) {
        if self.state == EditorState::Terminated {
            return;
        }
        let _ = self.output.flush();
        self.buffer.clear();
        self.display.reset();
        self.drawn = None;
        self.history = None;
        self.state = EditorState::Terminated;
    }

    fn write_raw(&mut self, text: &str) {
        let written = self.output.write_all(text.as_bytes()).and_then(|()| self.output.flush());
        if let Err(err) = written {
            self.record_write_error(err);
        }
    }

    fn record_write_error(&mut self, err: io::Error) {
        if self.write_error.is_none() {
            self.write_error = Some(err);
        }
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("buffer", &self.buffer)
            .field("keymap", &self.keymap)
            .finish_non_exhaustive()
    }
}

fn translate_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut prev = '\0';
    for c in text.chars() {
        if c == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(c);
        prev = c;
    }
    out
}
