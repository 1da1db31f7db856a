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

use super::buffer::LineBuffer;
use crate::error::{EditError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionOptions {
    /// Accept a longest-common-prefix extension even when several candidates remain.
    pub allow_prefix: bool,
    /// Treat an empty word at the cursor as trivially complete.
    pub allow_empty: bool,
}

/// A set of names the completion keys can complete against.
pub trait NameSource: Send + Sync {
    fn names(&self) -> Vec<&str>;
}

impl NameSource for Vec<&'static str> {
    fn names(&self) -> Vec<&str> {
        self.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Nothing typed at the cursor and `allow_empty` was set. The registry was not consulted.
    Empty,
    /// The word now spells out the only candidate.
    Unique(String),
    /// Several candidates remain; the word was extended to what they share.
    Prefix { common: String, candidates: Vec<String> },
}

/// Complete the word ending at the cursor against `names`.
///
/// On `AmbiguousCompletion` the word may already have been extended to the
/// longest common prefix; nothing else is inserted.
pub fn complete<'a, I>(buffer: &mut LineBuffer, names: I, opts: CompletionOptions) -> Result<Completion>
where
    I: IntoIterator<Item = &'a str>,
{
    let end = buffer.point();
    let start = buffer.word_start(end);
    if start == end && opts.allow_empty {
        return Ok(Completion::Empty);
    }

    let word = buffer.slice(start, end).to_owned();
    let candidates = matching(&word, names);
    let Some(first) = candidates.first() else {
        return Err(EditError::NoCompletionMatch);
    };

    if candidates.len() == 1 {
        let name = first.clone();
        buffer.insert(&name[word.len()..])?;
        return Ok(Completion::Unique(name));
    }

    let common = longest_common_prefix(&candidates);
    if common.len() > word.len() {
        buffer.insert(&common[word.len()..])?;
    }
    if opts.allow_prefix {
        Ok(Completion::Prefix { common, candidates })
    } else {
        Err(EditError::AmbiguousCompletion)
    }
}

/// Candidates for the word at the cursor, without touching the buffer.
pub fn candidates<'a, I>(buffer: &LineBuffer, names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let end = buffer.point();
    let start = buffer.word_start(end);
    matching(buffer.slice(start, end), names)
}

fn matching<'a, I>(word: &str, names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut found: Vec<String> =
        names.into_iter().filter(|name| name.starts_with(word)).map(str::to_owned).collect();
    found.sort_unstable();
    found.dedup();
    found
}

fn longest_common_prefix(candidates: &[String]) -> String {
    let Some((first, rest)) = candidates.split_first() else {
        return String::new();
    };
    let mut len = first.len();
    for other in rest {
        len = first
            .char_indices()
            .zip(other.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map_or(0, |((i, c), _)| i + c.len_utf8())
            .min(len);
    }
    first[..len].to_owned()
}
