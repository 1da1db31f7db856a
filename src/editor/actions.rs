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

//! Built-in key actions.

use std::sync::Arc;

use unicode_width::UnicodeWidthStr;

use super::Editor;
use super::complete::{CompletionOptions, NameSource};
use super::history::History;
use super::keymap::{Key, Keymap, SpecialKey, ctrl};
use crate::error::EditError;

const BACKSPACE: u8 = 0x08;
const DEL: u8 = 0x7f;
const COLUMN_GAP: usize = 2;
const FALLBACK_WIDTH: usize = 80;

pub(super) fn install_defaults(keymap: &mut Keymap) {
    keymap
        .bind(ctrl(b'a'), start_of_line)
        .bind(ctrl(b'e'), end_of_line)
        .bind(ctrl(b'b'), backward_char)
        .bind(ctrl(b'f'), forward_char)
        .bind(BACKSPACE, backward_delete_char)
        .bind(DEL, backward_delete_char)
        .bind(ctrl(b'd'), delete_char_or_eof)
        .bind(ctrl(b'k'), kill_line)
        .bind(ctrl(b'u'), unix_line_discard)
        .bind(ctrl(b'w'), unix_word_rubout)
        .bind(ctrl(b'y'), yank)
        .bind(ctrl(b'l'), clear_screen)
        .bind(ctrl(b'c'), interrupt)
        .bind(b'\r', accept_line)
        .bind(b'\n', accept_line)
        .bind(ctrl(b'p'), previous_history)
        .bind(ctrl(b'n'), next_history)
        .bind_special(SpecialKey::Home, start_of_line)
        .bind_special(SpecialKey::End, end_of_line)
        .bind_special(SpecialKey::Left, backward_char)
        .bind_special(SpecialKey::Right, forward_char)
        .bind_special(SpecialKey::Delete, delete_char)
        .bind_special(SpecialKey::Up, previous_history)
        .bind_special(SpecialKey::Down, next_history);
}

/// Bind Tab, Space and Enter to complete the word at the cursor against `names`.
///
/// Tab completes any word and lists the candidates when ambiguous. Space and Enter
/// only insist on a known name for the first word of the line; later words are free text.
pub fn bind_completion(keymap: &mut Keymap, names: &Arc<dyn NameSource>) {
    let tab = Arc::clone(names);
    let space = Arc::clone(names);
    let cr = Arc::clone(names);
    let lf = Arc::clone(names);
    keymap
        .bind(b'\t', move |editor: &mut Editor, _: Key| complete_word(editor, tab.as_ref()))
        .bind(b' ', move |editor: &mut Editor, _: Key| complete_then_space(editor, space.as_ref()))
        .bind(b'\r', move |editor: &mut Editor, _: Key| complete_then_accept(editor, cr.as_ref()))
        .bind(b'\n', move |editor: &mut Editor, _: Key| complete_then_accept(editor, lf.as_ref()));
}

fn start_of_line(editor: &mut Editor, _: Key) -> bool {
    editor.buffer_mut().move_home();
    true
}

fn end_of_line(editor: &mut Editor, _: Key) -> bool {
    editor.buffer_mut().move_end();
    true
}

fn backward_char(editor: &mut Editor, _: Key) -> bool {
    editor.buffer_mut().move_left()
}

fn forward_char(editor: &mut Editor, _: Key) -> bool {
    editor.buffer_mut().move_right()
}

fn backward_delete_char(editor: &mut Editor, _: Key) -> bool {
    editor.buffer_mut().delete_before()
}

fn delete_char(editor: &mut Editor, _: Key) -> bool {
    editor.buffer_mut().delete_at()
}

fn delete_char_or_eof(editor: &mut Editor, key: Key) -> bool {
    if editor.buffer().is_empty() {
        editor.end_input();
        return true;
    }
    delete_char(editor, key)
}

fn kill_line(editor: &mut Editor, _: Key) -> bool {
    let buffer = editor.buffer_mut();
    let (point, end) = (buffer.point(), buffer.end());
    buffer.kill(point, end).is_ok()
}

fn unix_line_discard(editor: &mut Editor, _: Key) -> bool {
    let buffer = editor.buffer_mut();
    let point = buffer.point();
    buffer.kill(0, point).is_ok()
}

fn unix_word_rubout(editor: &mut Editor, _: Key) -> bool {
    let buffer = editor.buffer_mut();
    let (start, point) = (buffer.previous_word_start(), buffer.point());
    start < point && buffer.kill(start, point).is_ok()
}

fn yank(editor: &mut Editor, _: Key) -> bool {
    matches!(editor.buffer_mut().yank(), Ok(true))
}

fn clear_screen(editor: &mut Editor, _: Key) -> bool {
    editor.clear_screen();
    true
}

fn interrupt(editor: &mut Editor, _: Key) -> bool {
    editor.abandon_line();
    true
}

fn accept_line(editor: &mut Editor, _: Key) -> bool {
    editor.done();
    true
}

fn previous_history(editor: &mut Editor, _: Key) -> bool {
    let Some(entry) = editor.history().and_then(History::peek_back).map(str::to_owned) else {
        return false;
    };
    let current = editor.buffer().line().to_owned();
    if !editor.replace_line(&entry) {
        return false;
    }
    if let Some(history) = editor.history_mut() {
        history.step_back(&current);
    }
    true
}

fn next_history(editor: &mut Editor, _: Key) -> bool {
    let Some(line) = editor.history().and_then(History::peek_forward).map(str::to_owned) else {
        return false;
    };
    if !editor.replace_line(&line) {
        return false;
    }
    if let Some(history) = editor.history_mut() {
        history.step_forward();
    }
    true
}

fn complete_word(editor: &mut Editor, names: &dyn NameSource) -> bool {
    let opts = CompletionOptions { allow_prefix: false, allow_empty: false };
    match editor.complete(names, opts) {
        Ok(_) => editor.insert_text(" "),
        Err(EditError::AmbiguousCompletion) => {
            show_candidates(editor, names);
            false
        }
        Err(_) => false,
    }
}

fn complete_then_space(editor: &mut Editor, names: &dyn NameSource) -> bool {
    if !in_command_word(editor) {
        return editor.insert_text(" ");
    }
    let opts = CompletionOptions { allow_prefix: true, allow_empty: true };
    editor.complete(names, opts).is_ok() && editor.insert_text(" ")
}

fn complete_then_accept(editor: &mut Editor, names: &dyn NameSource) -> bool {
    if in_command_word(editor) {
        let opts = CompletionOptions { allow_prefix: true, allow_empty: true };
        if editor.complete(names, opts).is_err() {
            return false;
        }
    }
    editor.done();
    true
}

/// True while the cursor sits in the first word of the line.
fn in_command_word(editor: &Editor) -> bool {
    let buffer = editor.buffer();
    let start = buffer.word_start(buffer.point());
    buffer.slice(0, start).trim().is_empty()
}

fn show_candidates(editor: &mut Editor, names: &dyn NameSource) {
    let candidates = super::complete::candidates(editor.buffer(), names.names());
    if candidates.is_empty() {
        return;
    }
    let width = match editor.width() {
        0 => FALLBACK_WIDTH,
        w => w,
    };
    let listing = format_columns(&candidates, width);
    editor.move_to_line_end();
    editor.print("\n");
    editor.print(&listing);
    editor.reset_line_state();
}

/// Lay `items` out in left-aligned columns that fit in `width`.
pub(crate) fn format_columns(items: &[impl AsRef<str>], width: usize) -> String {
    let cell = items.iter().map(|item| item.as_ref().width()).max().unwrap_or(0) + COLUMN_GAP;
    let per_row = (width / cell).max(1);
    let mut out = String::new();
    for row in items.chunks(per_row) {
        let mut line = String::new();
        for item in row {
            let item = item.as_ref();
            line.push_str(item);
            line.push_str(&" ".repeat(cell - item.width()));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
