// =====
// TESTS: 9
// =====
//
// Line editing through the keymap, as a user at a terminal would drive it.

use pretty_assertions::assert_eq;
use telline::editor::EditorOptions;
use telline::editor::keymap::{Key, Keymap, SpecialKey, ctrl};

use crate::helpers::{command_keymap, interactive, scripted_editor};

// --- Editing keys ---

#[test]
fn emacs_keys_edit_the_line() {
    let input = b"world\x01hello \x05!\x02\x02\x0b\r";
    let (mut editor, _) = scripted_editor(input, Keymap::with_defaults(), &EditorOptions::default());
    assert_eq!(editor.readline("> ").unwrap().as_deref(), Some("hello wor"));
}

#[test]
fn arrow_keys_and_delete_key() {
    let input = b"abXc\x1b[D\x1b[D\x1b[3~\x1b[C\x1b[Cd\r";
    let (mut editor, _) = scripted_editor(input, Keymap::with_defaults(), &EditorOptions::default());
    assert_eq!(editor.readline("> ").unwrap().as_deref(), Some("abcd"));
}

#[test]
fn utf8_input_is_one_character() {
    let input = "caf\u{e9}\x7fe\r".as_bytes();
    let (mut editor, _) = scripted_editor(input, Keymap::with_defaults(), &EditorOptions::default());
    assert_eq!(editor.readline("> ").unwrap().as_deref(), Some("cafe"));
}

#[test]
fn custom_binding_replaces_default() {
    let mut keymap = Keymap::with_defaults();
    keymap.bind(ctrl(b't'), |editor: &mut telline::editor::Editor, _: Key| editor.insert_text("<tab>"));
    let (mut editor, _) = scripted_editor(b"a\x14b\r", keymap, &EditorOptions::default());
    assert_eq!(editor.readline("").unwrap().as_deref(), Some("a<tab>b"));
}

// --- Redisplay ---

#[test]
fn snapshot_tracks_buffer_after_every_key() {
    let (mut editor, _) = scripted_editor(b"", Keymap::with_defaults(), &interactive(12));
    let keys = [
        Key::Byte(b'a'),
        Key::Byte(b'b'),
        Key::Special(SpecialKey::Home),
        Key::Char('\u{4F60}'),
        Key::Special(SpecialKey::End),
        Key::Byte(b'c'),
        Key::Byte(0x7f),
        Key::Byte(ctrl(b'u')),
        Key::Byte(ctrl(b'y')),
        Key::Byte(ctrl(b'y')),
    ];
    for key in keys {
        editor.dispatch(key);
        editor.redisplay().unwrap();
        let snapshot = editor.snapshot();
        assert_eq!(snapshot.content, editor.buffer().line());
        assert_eq!(snapshot.point, editor.buffer().point());
    }
    assert_eq!(editor.buffer().line(), "\u{4F60}ab\u{4F60}ab");
}

#[test]
fn interactive_line_ends_with_crlf() {
    let (mut editor, capture) = scripted_editor(b"hi\r", Keymap::with_defaults(), &interactive(80));
    assert_eq!(editor.readline("CLI> ").unwrap().as_deref(), Some("hi"));
    assert_eq!(capture.text(), "CLI> hi\r\n");
}

// --- Completion keys ---

#[test]
fn tab_completes_command_names() {
    let (mut editor, _) = scripted_editor(b"hi\t\r", command_keymap(), &EditorOptions::default());
    assert_eq!(editor.readline("").unwrap().as_deref(), Some("history "));
}

#[test]
fn ambiguous_tab_lists_candidates_and_redraws() {
    let (mut editor, capture) = scripted_editor(b"h\tel\r", command_keymap(), &interactive(80));
    assert_eq!(editor.readline("CLI> ").unwrap().as_deref(), Some("help"));
    let out = capture.text();
    assert!(out.contains("\x07"), "bell expected in {out:?}");
    assert!(out.contains("\r\nhelp     history\r\nCLI> h"), "candidate list expected in {out:?}");
}

#[test]
fn enter_completes_unique_prefix() {
    let (mut editor, _) = scripted_editor(b"sh\r", command_keymap(), &EditorOptions::default());
    assert_eq!(editor.readline("").unwrap().as_deref(), Some("shutdown"));
}
