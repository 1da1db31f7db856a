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

use std::io::{self, Write};

use crossterm::cursor::{MoveDown, MoveLeft, MoveRight, MoveTo, MoveToColumn, MoveUp};
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// The line as the terminal currently shows it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub content: String,
    pub point: usize,
}

/// Incremental renderer for one input line.
///
/// Tracks what was last drawn and only emits the changed suffix plus the cursor
/// moves needed to get there. After every call the snapshot matches what was passed in.
#[derive(Debug)]
pub struct Redisplay {
    snapshot: Snapshot,
    prompt: String,
    prompt_width: usize,
    /// Terminal width in columns; 0 disables wrap-aware positioning.
    width: usize,
    interactive: bool,
}

impl Redisplay {
    pub fn new(interactive: bool, width: usize) -> Self {
        Self { snapshot: Snapshot::default(), prompt: String::new(), prompt_width: 0, width, interactive }
    }

    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn set_width(&mut self, width: usize) {
        self.width = width;
    }

    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn reset(&mut self) {
        self.snapshot = Snapshot::default();
    }

    /// Draw the prompt at the start of a fresh row and forget the previous line.
    pub fn start_line(&mut self, out: &mut impl Write, prompt: &str) -> io::Result<()> {
        prompt.clone_into(&mut self.prompt);
        self.prompt_width = prompt.width();
        self.reset();
        if !self.interactive {
            return Ok(());
        }
        queue!(out, Print(prompt))?;
        self.settle_wrap(out, self.origin())?;
        out.flush()
    }

    /// Bring the terminal in line with `content` and `point`.
    pub fn render(&mut self, out: &mut impl Write, content: &str, point: usize) -> io::Result<()> {
        if !self.interactive {
            self.remember(content, point);
            return Ok(());
        }
        if self.snapshot.content == content && self.snapshot.point == point {
            return Ok(());
        }

        let old: Vec<char> = self.snapshot.content.chars().collect();
        let new: Vec<char> = content.chars().collect();
        let common = old.iter().zip(&new).take_while(|(a, b)| a == b).count();

        let old_point = self.locate(&old[..self.snapshot.point.min(old.len())]);
        let common_at = self.locate(&new[..common]);
        self.move_cursor(out, old_point, common_at)?;

        let new_end = self.layout(&new);
        if common < new.len() {
            queue!(out, Print(self.padded(common_at, &new[common..])))?;
            self.settle_wrap(out, new_end)?;
        }
        let new_end = self.settle(new_end);

        let old_end = self.locate(&old);
        if old_end > new_end {
            let clear = if old_end.row > new_end.row { ClearType::FromCursorDown } else { ClearType::UntilNewLine };
            queue!(out, Clear(clear))?;
        }

        self.move_cursor(out, new_end, self.locate(&new[..point.min(new.len())]))?;
        out.flush()?;
        self.remember(content, point);
        Ok(())
    }

    /// Put the cursor after the last character of the line, e.g. before printing
    /// below it. The line itself is left as drawn.
    pub fn move_to_end(&mut self, out: &mut impl Write) -> io::Result<()> {
        if !self.interactive {
            return Ok(());
        }
        let line: Vec<char> = self.snapshot.content.chars().collect();
        let point = self.locate(&line[..self.snapshot.point.min(line.len())]);
        self.move_cursor(out, point, self.locate(&line))?;
        out.flush()?;
        self.snapshot.point = line.len();
        Ok(())
    }

    /// Finish the line: put the cursor after the last character and start a new row.
    /// Non-interactive streams get the prompt and line as plain text instead.
    pub fn finish_line(&mut self, out: &mut impl Write, content: &str) -> io::Result<()> {
        if self.interactive {
            self.move_to_end(out)?;
            queue!(out, Print("\r\n"))?;
        } else {
            queue!(out, Print(&self.prompt), Print(content), Print("\n"))?;
        }
        out.flush()?;
        self.reset();
        Ok(())
    }

    /// Redraw prompt and line from scratch on the current row (after output was
    /// printed below the line).
    pub fn redraw(&mut self, out: &mut impl Write, content: &str, point: usize) -> io::Result<()> {
        let prompt = std::mem::take(&mut self.prompt);
        self.start_line(out, &prompt)?;
        self.render(out, content, point)
    }

    /// Clear the whole screen and draw the line at the top.
    pub fn clear_screen(&mut self, out: &mut impl Write, content: &str, point: usize) -> io::Result<()> {
        if self.interactive {
            queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        self.redraw(out, content, point)
    }

    fn remember(&mut self, content: &str, point: usize) {
        content.clone_into(&mut self.snapshot.content);
        self.snapshot.point = point;
    }

    /// Where the prompt leaves the cursor, before any wrap is settled.
    fn origin(&self) -> Position {
        match self.width {
            0 => Position { row: 0, col: self.prompt_width },
            w if self.prompt_width > 0 && self.prompt_width % w == 0 => {
                Position { row: self.prompt_width / w - 1, col: w }
            }
            w => Position { row: self.prompt_width / w, col: self.prompt_width % w },
        }
    }

    /// Lay `chars` out after the prompt. A wide character that does not fit in the
    /// rest of a row starts the next one. The result may sit one past the margin.
    fn layout(&self, chars: &[char]) -> Position {
        chars.iter().fold(self.origin(), |pos, &c| self.advance(pos, c))
    }

    fn advance(&self, mut pos: Position, c: char) -> Position {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if self.width > 0 && pos.col + w > self.width {
            pos = Position { row: pos.row + 1, col: 0 };
        }
        pos.col += w;
        pos
    }

    fn settle(&self, pos: Position) -> Position {
        if self.width > 0 && pos.col >= self.width { Position { row: pos.row + 1, col: 0 } } else { pos }
    }

    /// Screen position of the cursor after `chars`.
    fn locate(&self, chars: &[char]) -> Position {
        self.settle(self.layout(chars))
    }

    /// `chars` as printed from `from`, with blanks filling the cell a wide character
    /// skips at the margin so the terminal never has to decide where it goes.
    fn padded(&self, from: Position, chars: &[char]) -> String {
        let mut text = String::with_capacity(chars.len());
        let mut pos = from;
        for &c in chars {
            let next = self.advance(pos, c);
            if next.row > pos.row && pos.col < self.width {
                text.extend(std::iter::repeat_n(' ', self.width - pos.col));
            }
            text.push(c);
            pos = next;
        }
        text
    }

    fn move_cursor(&self, out: &mut impl Write, from: Position, to: Position) -> io::Result<()> {
        if to.row < from.row {
            queue!(out, MoveUp(to_u16(from.row - to.row)))?;
        } else if to.row > from.row {
            queue!(out, MoveDown(to_u16(to.row - from.row)))?;
        }
        if to.row != from.row {
            queue!(out, MoveToColumn(to_u16(to.col)))?;
        } else if to.col < from.col {
            queue!(out, MoveLeft(to_u16(from.col - to.col)))?;
        } else if to.col > from.col {
            queue!(out, MoveRight(to_u16(to.col - from.col)))?;
        }
        Ok(())
    }

    /// Text ending exactly on the right margin leaves the terminal cursor parked in
    /// the last column; push it to the start of the next row so positions stay exact.
    fn settle_wrap(&self, out: &mut impl Write, end: Position) -> io::Result<()> {
        if self.width > 0 && end.col >= self.width {
            queue!(out, Print("\r\n"))?;
        }
        Ok(())
    }
}

/// Row and column relative to the row the prompt starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Position {
    row: usize,
    col: usize,
}

fn to_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}
