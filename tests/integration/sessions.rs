// =====
// TESTS: 5
// =====
//
// Session loop behaviour: history recording, command dispatch and isolation
// between concurrently running editors.

use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use telline::commands::Registry;
use telline::editor::EditorOptions;
use telline::editor::keymap::Keymap;
use telline::session::{SessionExit, run_session};

use crate::helpers::{command_keymap, interactive, scripted_editor};

fn remote_like() -> EditorOptions {
    interactive(80)
}

#[test]
fn history_recall_runs_previous_command() {
    let input = b"help quit\r\x1b[A\r\x1b[A\x1b[A\x1b[B\x15quit\r";
    let (mut editor, capture) = scripted_editor(input, command_keymap(), &remote_like());
    let exit = run_session(&mut editor, &Registry::builtin(), "CLI> ");
    assert_eq!(exit, SessionExit::Closed);

    let history: Vec<&str> = editor.history().unwrap().iter().collect();
    assert_eq!(history, vec!["help quit", "help quit", "quit"]);
    assert_eq!(capture.text().matches("Close this session.").count(), 2);
}

#[test]
fn history_is_bounded_per_session() {
    let input = b"help\rhelp\rhistory\r?\rhelp quit\rhistory\rquit\r";
    let (mut editor, capture) = scripted_editor(input, command_keymap(), &remote_like());
    run_session(&mut editor, &Registry::builtin(), "CLI> ");

    let history: Vec<&str> = editor.history().unwrap().iter().collect();
    assert_eq!(history, vec!["history", "?", "help quit", "history", "quit"]);
    let out = capture.text();
    assert!(out.contains("    1  help\r\n    2  help\r\n    3  history\r\n"), "{out:?}");
}

#[test]
fn unknown_command_is_reported_and_session_continues() {
    let input = b"frob\r\x15quit\r";
    let (mut editor, capture) = scripted_editor(input, Keymap::with_defaults(), &EditorOptions::default());
    assert_eq!(run_session(&mut editor, &Registry::builtin(), "> "), SessionExit::Closed);
    assert!(capture.text().contains("frob: No such command.  There is `help'.\n"));
}

#[test]
fn shutdown_from_any_session() {
    let (mut editor, capture) = scripted_editor(b"shut\r", command_keymap(), &remote_like());
    assert_eq!(run_session(&mut editor, &Registry::builtin(), "CLI> "), SessionExit::Shutdown);
    assert!(capture.text().contains("Shutting down.\r\n"));
}

#[test]
fn concurrent_sessions_do_not_share_state() {
    let registry = Arc::new(Registry::builtin());
    let scripts: [&[u8]; 2] = [b"help\rhelp quit\rhistory\r", b"?\r\x1b[A\x15history\r"];

    let workers: Vec<_> = scripts
        .into_iter()
        .map(|script| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let (mut editor, capture) = scripted_editor(script, command_keymap(), &remote_like());
                run_session(&mut editor, &registry, "CLI> ");
                capture.text()
            })
        })
        .collect();
    let outputs: Vec<String> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    assert!(outputs[0].contains("    1  help\r\n    2  help quit\r\n    3  history\r\n"), "{:?}", outputs[0]);
    assert!(outputs[1].contains("    1  ?\r\n    2  history\r\n"), "{:?}", outputs[1]);
    assert!(!outputs[1].contains("help quit"));
}
