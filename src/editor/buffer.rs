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

use std::borrow::Cow;

use crate::error::{EditError, Result};

/// How typed characters are shown on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Echo {
    #[default]
    Enabled,
    /// Show this character in place of every typed character.
    Masked(char),
    /// Show nothing; the on-screen cursor stays put.
    Hidden,
}

/// The in-progress input line and its cursor.
///
/// `point` and `end` count characters, not bytes. Every mutation keeps
/// `0 <= point <= end` and never touches the terminal.
#[derive(Debug)]
pub struct LineBuffer {
    content: String,
    point: usize,
    end: usize,
    /// 0 means unlimited.
    max_length: usize,
    echo: Echo,
    kill: Option<String>,
    /// Bumped on every content, cursor or echo change. The editor compares it with the
    /// version it last drew to skip redisplay.
    version: u64,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_limit(0)
    }

    pub fn with_limit(max_length: usize) -> Self {
        Self {
            content: String::new(),
            point: 0,
            end: 0,
            max_length,
            echo: Echo::Enabled,
            kill: None,
            version: 0,
        }
    }

    #[must_use]
    pub fn line(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn point(&self) -> usize {
        self.point
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Applies to later insertions only; existing content is never truncated.
    pub fn set_max_length(&mut self, max_length: usize) {
        self.max_length = max_length;
    }

    #[must_use]
    pub fn echo(&self) -> Echo {
        self.echo
    }

    pub fn set_echo(&mut self, echo: Echo) {
        self.echo = echo;
        self.version += 1;
    }

    #[must_use]
    pub fn kill_text(&self) -> Option<&str> {
        self.kill.as_deref()
    }

    /// Characters `start..end` of the line.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> &str {
        let from = char_to_byte_index(&self.content, start);
        let to = char_to_byte_index(&self.content, end);
        &self.content[from..to.max(from)]
    }

    /// Insert at the cursor.
    pub fn insert(&mut self, text: &str) -> Result<()> {
        self.insert_at(self.point, text)
    }

    /// Insert at `offset`. The whole insertion is rejected when it would push the line
    /// past `max_length`.
    pub fn insert_at(&mut self, offset: usize, text: &str) -> Result<()> {
        if offset > self.end {
            return Err(EditError::InvalidRange { start: offset, end: offset, len: self.end });
        }
        let count = text.chars().count();
        if count == 0 {
            return Ok(());
        }
        self.check_limit(self.end + count)?;

        let byte_idx = char_to_byte_index(&self.content, offset);
        self.content.insert_str(byte_idx, text);
        self.end += count;
        if offset <= self.point {
            self.point += count;
        }
        self.version += 1;
        Ok(())
    }

    /// Remove the half-open character range `start..end`.
    pub fn delete(&mut self, start: usize, end: usize) -> Result<()> {
        self.remove_range(start, end).map(drop)
    }

    /// Like [`Self::delete`], but remembers the removed text for [`Self::yank`].
    pub fn kill(&mut self, start: usize, end: usize) -> Result<()> {
        let removed = self.remove_range(start, end)?;
        if !removed.is_empty() {
            self.kill = Some(removed);
        }
        Ok(())
    }

    /// Insert the last killed text at the cursor. Returns `Ok(false)` when nothing was
    /// ever killed.
    pub fn yank(&mut self) -> Result<bool> {
        let Some(text) = self.kill.clone() else {
            return Ok(false);
        };
        self.insert(&text)?;
        Ok(true)
    }

    /// Replace the line wholesale, placing the cursor at the end.
    pub fn set_line(&mut self, text: &str) -> Result<()> {
        let count = text.chars().count();
        self.check_limit(count)?;
        text.clone_into(&mut self.content);
        self.end = count;
        self.point = count;
        self.version += 1;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.point = 0;
        self.end = 0;
        self.version += 1;
    }

    /// Take the finished line out, leaving the buffer empty.
    pub fn take(&mut self) -> String {
        self.point = 0;
        self.end = 0;
        self.version += 1;
        std::mem::take(&mut self.content)
    }

    pub fn move_point(&mut self, new_point: usize) -> Result<()> {
        if new_point > self.end {
            return Err(EditError::InvalidRange { start: new_point, end: new_point, len: self.end });
        }
        self.point = new_point;
        self.version += 1;
        Ok(())
    }

    pub fn move_left(&mut self) -> bool {
        if self.point == 0 {
            return false;
        }
        self.point -= 1;
        self.version += 1;
        true
    }

    pub fn move_right(&mut self) -> bool {
        if self.point >= self.end {
            return false;
        }
        self.point += 1;
        self.version += 1;
        true
    }

    pub fn move_home(&mut self) {
        self.point = 0;
        self.version += 1;
    }

    pub fn move_end(&mut self) {
        self.point = self.end;
        self.version += 1;
    }

    /// Backspace. Returns false at the start of the line.
    pub fn delete_before(&mut self) -> bool {
        self.point > 0 && self.delete(self.point - 1, self.point).is_ok()
    }

    /// Delete key. Returns false at the end of the line.
    pub fn delete_at(&mut self) -> bool {
        self.point < self.end && self.delete(self.point, self.point + 1).is_ok()
    }

    /// Start of the whitespace-delimited word ending at `at`.
    #[must_use]
    pub fn word_start(&self, at: usize) -> usize {
        let chars: Vec<char> = self.content.chars().take(at).collect();
        chars.iter().rposition(|c| c.is_whitespace()).map_or(0, |i| i + 1)
    }

    /// Where a backward word kill stops: trailing whitespace is skipped first.
    #[must_use]
    pub fn previous_word_start(&self) -> usize {
        let chars: Vec<char> = self.content.chars().take(self.point).collect();
        let mut pos = chars.len();
        while pos > 0 && chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        while pos > 0 && !chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        pos
    }

    /// What the terminal should show, honouring the echo mode.
    #[must_use]
    pub fn display_text(&self) -> Cow<'_, str> {
        match self.echo {
            Echo::Enabled => Cow::Borrowed(&self.content),
            Echo::Masked(c) => Cow::Owned(std::iter::repeat_n(c, self.end).collect()),
            Echo::Hidden => Cow::Borrowed(""),
        }
    }

    /// Cursor offset within [`Self::display_text`].
    #[must_use]
    pub fn display_point(&self) -> usize {
        match self.echo {
            Echo::Hidden => 0,
            _ => self.point,
        }
    }

    fn check_limit(&self, new_len: usize) -> Result<()> {
        if self.max_length > 0 && new_len > self.max_length {
            return Err(EditError::LimitExceeded { limit: self.max_length });
        }
        Ok(())
    }

    fn remove_range(&mut self, start: usize, end: usize) -> Result<String> {
        if start > end || end > self.end {
            return Err(EditError::InvalidRange { start, end, len: self.end });
        }
        if start == end {
            return Ok(String::new());
        }
        let from = char_to_byte_index(&self.content, start);
        let to = char_to_byte_index(&self.content, end);
        let removed: String = self.content.drain(from..to).collect();

        let count = end - start;
        if self.point >= end {
            self.point -= count;
        } else if self.point > start {
            self.point = start;
        }
        self.end -= count;
        self.version += 1;
        Ok(removed)
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a character index to a byte index within a string.
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn buffer_with(text: &str) -> LineBuffer {
        let mut buf = LineBuffer::new();
        buf.insert(text).unwrap();
        buf
    }

    fn assert_invariant(buf: &LineBuffer) {
        assert!(buf.point() <= buf.end(), "point {} > end {}", buf.point(), buf.end());
        assert_eq!(buf.end(), buf.line().chars().count());
    }

    // char_to_byte_index

    #[test]
    fn char_to_byte_index_ascii() {
        assert_eq!(char_to_byte_index("hello", 0), 0);
        assert_eq!(char_to_byte_index("hello", 2), 2);
        assert_eq!(char_to_byte_index("hello", 5), 5);
    }

    #[test]
    fn char_to_byte_index_emoji() {
        let s = "\u{1F600}hello";
        assert_eq!(char_to_byte_index(s, 1), 4);
        assert_eq!(char_to_byte_index("ab", 10), 2);
    }

    // insert

    #[test]
    fn insert_advances_point_and_end() {
        let mut buf = LineBuffer::new();
        buf.insert("he").unwrap();
        buf.insert("llo").unwrap();
        assert_eq!(buf.line(), "hello");
        assert_eq!((buf.point(), buf.end()), (5, 5));
    }

    #[test]
    fn insert_mid_line() {
        let mut buf = buffer_with("ac");
        assert!(buf.move_left());
        buf.insert("b").unwrap();
        assert_eq!(buf.line(), "abc");
        assert_eq!(buf.point(), 2);
    }

    #[test]
    fn insert_at_offset_after_point_keeps_point() {
        let mut buf = buffer_with("abc");
        buf.move_home();
        buf.insert_at(3, "d").unwrap();
        assert_eq!(buf.line(), "abcd");
        assert_eq!(buf.point(), 0);
    }

    #[test]
    fn insert_at_past_end_is_invalid() {
        let mut buf = buffer_with("ab");
        assert!(matches!(buf.insert_at(5, "x"), Err(EditError::InvalidRange { .. })));
        assert_eq!(buf.line(), "ab");
    }

    #[test]
    fn insert_multibyte_counts_chars() {
        let mut buf = LineBuffer::new();
        buf.insert("\u{4F60}\u{597D}").unwrap();
        assert_eq!(buf.end(), 2);
        assert!(buf.move_left());
        buf.insert("x").unwrap();
        assert_eq!(buf.line(), "\u{4F60}x\u{597D}");
    }

    #[test]
    fn insert_empty_does_not_bump_version() {
        let mut buf = LineBuffer::new();
        let v = buf.version();
        buf.insert("").unwrap();
        assert_eq!(buf.version(), v);
    }

    #[test]
    fn insert_past_limit_is_rejected_atomically() {
        let mut buf = LineBuffer::with_limit(4);
        buf.insert("abc").unwrap();
        buf.move_left();
        let before = (buf.line().to_owned(), buf.point(), buf.end(), buf.version());

        let err = buf.insert("xy").unwrap_err();
        assert!(matches!(err, EditError::LimitExceeded { limit: 4 }));
        assert_eq!((buf.line().to_owned(), buf.point(), buf.end(), buf.version()), before);

        buf.insert("x").unwrap();
        assert_eq!(buf.line(), "abxc");
    }

    // delete

    #[test]
    fn delete_range_before_point_shifts_point() {
        let mut buf = buffer_with("hello world");
        buf.delete(0, 6).unwrap();
        assert_eq!(buf.line(), "world");
        assert_eq!(buf.point(), 5);
    }

    #[test]
    fn delete_range_around_point_clamps_to_start() {
        let mut buf = buffer_with("abcdef");
        buf.move_point(3).unwrap();
        buf.delete(1, 5).unwrap();
        assert_eq!(buf.line(), "af");
        assert_eq!(buf.point(), 1);
    }

    #[test]
    fn delete_invalid_ranges() {
        let mut buf = buffer_with("abc");
        assert!(matches!(buf.delete(2, 1), Err(EditError::InvalidRange { .. })));
        assert!(matches!(buf.delete(1, 4), Err(EditError::InvalidRange { .. })));
        assert_eq!(buf.line(), "abc");
    }

    #[test]
    fn backspace_and_delete_at_boundaries() {
        let mut buf = buffer_with("ab");
        assert!(!buf.delete_at());
        assert!(buf.delete_before());
        assert_eq!(buf.line(), "a");
        buf.move_home();
        assert!(!buf.delete_before());
        assert!(buf.delete_at());
        assert!(buf.is_empty());
    }

    // movement

    #[test]
    fn move_point_bounds() {
        let mut buf = buffer_with("abc");
        buf.move_point(1).unwrap();
        assert_eq!(buf.point(), 1);
        assert!(matches!(buf.move_point(4), Err(EditError::InvalidRange { .. })));
        assert_eq!(buf.point(), 1);
    }

    #[test]
    fn move_left_right_stop_at_edges() {
        let mut buf = buffer_with("a");
        assert!(!buf.move_right());
        assert!(buf.move_left());
        assert!(!buf.move_left());
        assert_eq!(buf.point(), 0);
    }

    // set_line / take / clear

    #[test]
    fn set_line_puts_point_at_end() {
        let mut buf = buffer_with("old");
        buf.move_home();
        buf.set_line("brand new").unwrap();
        assert_eq!(buf.line(), "brand new");
        assert_eq!((buf.point(), buf.end()), (9, 9));
    }

    #[test]
    fn set_line_respects_limit() {
        let mut buf = LineBuffer::with_limit(3);
        buf.insert("ab").unwrap();
        assert!(buf.set_line("abcd").is_err());
        assert_eq!(buf.line(), "ab");
    }

    #[test]
    fn take_empties_buffer() {
        let mut buf = buffer_with("line");
        assert_eq!(buf.take(), "line");
        assert!(buf.is_empty());
        assert_eq!(buf.point(), 0);
    }

    // kill / yank

    #[test]
    fn kill_then_yank_restores_text() {
        let mut buf = buffer_with("hello world");
        let start = buf.previous_word_start();
        buf.kill(start, buf.point()).unwrap();
        assert_eq!(buf.line(), "hello ");
        assert_eq!(buf.kill_text(), Some("world"));
        buf.move_home();
        assert!(buf.yank().unwrap());
        assert_eq!(buf.line(), "worldhello ");
    }

    #[test]
    fn yank_without_kill_is_noop() {
        let mut buf = LineBuffer::new();
        assert!(!buf.yank().unwrap());
        assert!(buf.is_empty());
    }

    // words

    #[test]
    fn word_start_scans_back_to_whitespace() {
        let buf = buffer_with("help hist");
        assert_eq!(buf.word_start(buf.point()), 5);
        assert_eq!(buf.word_start(3), 0);
        assert_eq!(buf.slice(5, 9), "hist");
    }

    #[test]
    fn previous_word_start_skips_trailing_space() {
        let buf = buffer_with("one two   ");
        assert_eq!(buf.previous_word_start(), 4);
    }

    // echo

    #[test]
    fn masked_echo_displays_substitute() {
        let mut buf = buffer_with("secret");
        buf.set_echo(Echo::Masked('*'));
        assert_eq!(buf.display_text(), "******");
        assert_eq!(buf.display_point(), 6);
        buf.set_echo(Echo::Hidden);
        assert_eq!(buf.display_text(), "");
        assert_eq!(buf.display_point(), 0);
    }

    // invariant under mixed sequences

    #[test]
    fn point_never_exceeds_end_across_mixed_operations() {
        let mut buf = LineBuffer::with_limit(12);
        let words = ["ab", "\u{1F600}", "cde", "", "xyz!", "  "];
        for step in 0..200_usize {
            match step % 7 {
                0 | 1 => {
                    let _ = buf.insert(words[step % words.len()]);
                }
                2 => {
                    let end = buf.end();
                    let _ = buf.delete(step % (end + 1), end);
                }
                3 => {
                    let _ = buf.move_point(step % (buf.end() + 2));
                }
                4 => {
                    buf.delete_before();
                }
                5 => {
                    let _ = buf.kill(buf.previous_word_start(), buf.point());
                }
                _ => {
                    let _ = buf.yank();
                }
            }
            assert_invariant(&buf);
            assert!(buf.end() <= 12);
        }
    }
}
