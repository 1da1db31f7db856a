use std::io::{self, Cursor, Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use telline::commands::Registry;
use telline::editor::actions::bind_completion;
use telline::editor::complete::NameSource;
use telline::editor::keymap::Keymap;
use telline::editor::{Editor, EditorOptions};
use telline::session::SessionId;

/// Output sink that stays readable after the editor took ownership of it.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Default bindings plus completion against the built-in commands.
pub fn command_keymap() -> Keymap {
    let names: Arc<dyn NameSource> = Arc::new(Registry::builtin());
    let mut keymap = Keymap::with_defaults();
    bind_completion(&mut keymap, &names);
    keymap
}

/// An editor reading `input` and writing into the returned capture.
pub fn scripted_editor(input: &[u8], keymap: Keymap, options: &EditorOptions) -> (Editor, Capture) {
    let capture = Capture::default();
    let editor =
        Editor::new(SessionId::new(100), Box::new(Cursor::new(input.to_vec())), Box::new(capture.clone()), keymap, options);
    (editor, capture)
}

pub fn interactive(width: usize) -> EditorOptions {
    EditorOptions { interactive: true, width, history_limit: Some(5), ..EditorOptions::default() }
}

/// Read from `stream` until the accumulated output contains `needle`.
pub fn read_until(stream: &mut TcpStream, seen: &mut Vec<u8>, needle: &str) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    stream.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
    let mut chunk = [0_u8; 512];
    while !String::from_utf8_lossy(seen).contains(needle) {
        assert!(Instant::now() < deadline, "timed out waiting for {needle:?}, got {:?}", String::from_utf8_lossy(seen));
        match stream.read(&mut chunk) {
            Ok(0) => panic!("connection closed before {needle:?} arrived"),
            Ok(n) => seen.extend_from_slice(&chunk[..n]),
            Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(err) => panic!("read failed: {err}"),
        }
    }
    String::from_utf8_lossy(seen).into_owned()
}

/// Read until the peer closes the connection; returns everything received.
pub fn read_to_close(stream: &mut TcpStream) -> Vec<u8> {
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut all = Vec::new();
    stream.read_to_end(&mut all).unwrap();
    all
}
