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

//! Command registry shared by every session, and the built-in commands.

use std::fmt::Write as _;

use crate::editor::Editor;
use crate::editor::complete::NameSource;

const HELP_COLUMNS: usize = 6;
const NAME_WIDTH: usize = 12;

/// What the session loop should do after a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Continue,
    /// Close the session that ran the command.
    EndSession,
    /// Stop the whole process.
    Shutdown,
}

/// Everything a command gets to work with.
pub struct Invocation<'a> {
    pub editor: &'a mut Editor,
    pub registry: &'a Registry,
    /// The line after the command word, leading whitespace removed.
    pub args: &'a str,
}

pub type Handler = fn(&mut Invocation<'_>) -> Directive;

#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub doc: String,
    pub run: Handler,
}

impl Command {
    pub fn new(name: impl Into<String>, doc: impl Into<String>, run: Handler) -> Self {
        Self { name: name.into(), doc: doc.into(), run }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command").field("name", &self.name).field("doc", &self.doc).finish_non_exhaustive()
    }
}

/// Read-only table of commands, ordered by name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    commands: Vec<Command>,
}

impl Registry {
    /// Build a registry. Entries are sorted by name; a later entry replaces an
    /// earlier one with the same name.
    pub fn new(commands: impl IntoIterator<Item = Command>) -> Self {
        let mut commands: Vec<Command> = commands.into_iter().collect();
        commands.reverse();
        commands.sort_by(|a, b| a.name.cmp(&b.name));
        commands.dedup_by(|dup, kept| dup.name == kept.name);
        Self { commands }
    }

    /// The commands every session understands.
    pub fn builtin() -> Self {
        Self::new([
            Command::new("help", "Display this text, or the description of one command", help),
            Command::new("?", "Synonym for `help'", help),
            Command::new("history", "List the lines entered in this session", history),
            Command::new("quit", "Close this session", quit),
            Command::new("shutdown", "Stop the server and close every session", shutdown),
        ])
    }

    #[must_use]
    pub fn all(&self) -> &[Command] {
        &self.commands
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Resolve `word` to a command. An exact name wins; otherwise `word` must be
    /// a prefix of exactly one name.
    #[must_use]
    pub fn find_by_unambiguous_prefix(&self, word: &str) -> Option<&Command> {
        if word.is_empty() {
            return None;
        }
        if let Ok(idx) = self.commands.binary_search_by(|c| c.name.as_str().cmp(word)) {
            return self.commands.get(idx);
        }
        let mut matches = self.commands.iter().filter(|c| c.name.starts_with(word));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    /// Run one accepted line. Blank lines do nothing.
    pub fn execute(&self, editor: &mut Editor, line: &str) -> Directive {
        let line = line.trim();
        if line.is_empty() {
            return Directive::Continue;
        }
        let (word, args) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim_start()),
            None => (line, ""),
        };
        let Some(command) = self.find_by_unambiguous_prefix(word) else {
            editor.print(&format!("{word}: No such command.  There is `help'.\n"));
            return Directive::Continue;
        };
        tracing::debug!(session = %editor.id(), command = %command.name, "running command");
        let run = command.run;
        run(&mut Invocation { editor, registry: self, args })
    }
}

impl NameSource for Registry {
    fn names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name.as_str()).collect()
    }
}

fn describe(out: &mut String, command: &Command) {
    let _ = writeln!(out, "{:<NAME_WIDTH$}{}.", command.name, command.doc);
}

fn help(inv: &mut Invocation<'_>) -> Directive {
    let mut out = String::new();
    if inv.args.is_empty() {
        for command in inv.registry.all() {
            describe(&mut out, command);
        }
    } else if let Some(command) = inv.registry.find_by_unambiguous_prefix(inv.args) {
        describe(&mut out, command);
    } else {
        let _ = writeln!(out, "No `{}' command.  Valid command names are:", inv.args);
        let names: Vec<&str> = inv.registry.names();
        for row in names.chunks(HELP_COLUMNS) {
            let _ = writeln!(out, "{}", row.join("\t"));
        }
        out.push_str("\nTry `help [command]' for more information.\n");
    }
    inv.editor.print(&out);
    Directive::Continue
}

fn history(inv: &mut Invocation<'_>) -> Directive {
    let Some(history) = inv.editor.history() else {
        inv.editor.print("History is disabled for this session.\n");
        return Directive::Continue;
    };
    let mut out = String::new();
    for (n, line) in history.iter().enumerate() {
        let _ = writeln!(out, "{:>5}  {line}", n + 1);
    }
    inv.editor.print(&out);
    Directive::Continue
}

fn quit(_: &mut Invocation<'_>) -> Directive {
    Directive::EndSession
}

fn shutdown(inv: &mut Invocation<'_>) -> Directive {
    inv.editor.print("Shutting down.\n");
    Directive::Shutdown
}
