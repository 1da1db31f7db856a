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

use std::collections::VecDeque;

use crate::error::{EditError, Result};

/// Bounded log of accepted lines, oldest first.
///
/// Eviction is strictly FIFO. Navigation state (`cursor` and the stashed in-progress
/// line) is reset by every mutation, since offsets shift underneath it.
#[derive(Debug, Default)]
pub struct History {
    entries: VecDeque<String>,
    /// 0 means unbounded.
    limit: usize,
    /// `None` while the user is on the in-progress line.
    cursor: Option<usize>,
    stash: Option<String>,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self { entries: VecDeque::new(), limit, cursor: None, stash: None }
    }

    pub fn add(&mut self, line: &str) {
        self.entries.push_back(line.to_owned());
        self.trim_to_limit();
        self.reset_navigation();
    }

    pub fn remove(&mut self, offset: usize) -> Result<String> {
        let len = self.entries.len();
        let removed = self.entries.remove(offset).ok_or(EditError::OutOfRange { offset, len })?;
        self.reset_navigation();
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.reset_navigation();
    }

    /// Change the limit, evicting the oldest entries if the store is now over it.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        self.trim_to_limit();
        self.reset_navigation();
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Entry at `offset`, counted from the oldest.
    pub fn get(&self, offset: usize) -> Result<&str> {
        self.entries
            .get(offset)
            .map(String::as_str)
            .ok_or(EditError::OutOfRange { offset, len: self.entries.len() })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    #[must_use]
    pub fn is_navigating(&self) -> bool {
        self.cursor.is_some()
    }

    /// The entry [`step_back`](Self::step_back) would move to, without moving.
    #[must_use]
    pub fn peek_back(&self) -> Option<&str> {
        self.entries.get(self.older()?).map(String::as_str)
    }

    /// The line [`step_forward`](Self::step_forward) would return, without moving.
    #[must_use]
    pub fn peek_forward(&self) -> Option<&str> {
        let idx = self.cursor?;
        match self.entries.get(idx + 1) {
            Some(entry) => Some(entry),
            None => Some(self.stash.as_deref().unwrap_or_default()),
        }
    }

    /// Step towards older entries. The first step stashes `current_line` so that
    /// stepping forward past the newest entry can bring it back. Returns `None`
    /// (and changes nothing) when already at the oldest entry.
    pub fn step_back(&mut self, current_line: &str) -> Option<&str> {
        let target = self.older()?;
        if self.cursor.is_none() {
            self.stash = Some(current_line.to_owned());
        }
        self.cursor = Some(target);
        self.entries.get(target).map(String::as_str)
    }

    /// Step towards newer entries. Past the newest entry, navigation ends and the
    /// stashed in-progress line is returned. Returns `None` when not navigating.
    pub fn step_forward(&mut self) -> Option<String> {
        let idx = self.cursor?;
        if idx + 1 < self.entries.len() {
            self.cursor = Some(idx + 1);
            return self.entries.get(idx + 1).cloned();
        }
        self.cursor = None;
        Some(self.stash.take().unwrap_or_default())
    }

    fn older(&self) -> Option<usize> {
        match self.cursor {
            None => self.entries.len().checked_sub(1),
            Some(idx) => idx.checked_sub(1),
        }
    }

    pub fn reset_navigation(&mut self) {
        self.cursor = None;
        self.stash = None;
    }

    fn trim_to_limit(&mut self) {
        if self.limit == 0 {
            return;
        }
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }
}
