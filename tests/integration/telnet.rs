// =====
// TESTS: 4
// =====
//
// Telnet sessions over loopback: handshake, teardown on quit, isolation and
// process-wide shutdown.

use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc::Receiver;
use std::time::Duration;

use pretty_assertions::assert_eq;
use telline::commands::Registry;
use telline::config::Config;
use telline::session::telnet::HANDSHAKE;
use telline::session::{SessionEvent, SessionManager};

use crate::helpers::{read_to_close, read_until};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

fn loopback_manager() -> (SessionManager, Receiver<SessionEvent>, SocketAddr) {
    let config = Config {
        listen: "127.0.0.1:0".parse().unwrap(),
        local_enabled: false,
        ..Config::default()
    };
    let (mut manager, events) = SessionManager::new(config, Registry::builtin());
    let addr = manager.start_telnet().unwrap();
    (manager, events, addr)
}

/// Connect and wait for the handshake and first prompt.
fn connect(addr: SocketAddr) -> (TcpStream, Vec<u8>) {
    let mut stream = TcpStream::connect(addr).unwrap();
    let mut seen = Vec::new();
    read_until(&mut stream, &mut seen, "CLI> ");
    assert_eq!(&seen[..HANDSHAKE.len()], &HANDSHAKE);
    (stream, seen)
}

#[test]
fn quit_closes_only_that_connection() {
    let (mut manager, events, addr) = loopback_manager();

    let (mut first, _) = connect(addr);
    first.write_all(b"quit\r").unwrap();
    let rest = read_to_close(&mut first);
    assert!(String::from_utf8_lossy(&rest).contains("quit\r\n"));

    match events.recv_timeout(EVENT_TIMEOUT).unwrap() {
        SessionEvent::SessionEnded { .. } => {}
        other => panic!("unexpected event {other:?}"),
    }

    // The acceptor keeps serving after a session went away.
    let (mut second, mut seen) = connect(addr);
    second.write_all(b"help quit\r").unwrap();
    read_until(&mut second, &mut seen, "Close this session.\r\n");
    assert_eq!(manager.session_ids().len(), 1);

    manager.shutdown();
    read_to_close(&mut second);
    assert!(manager.session_ids().is_empty());
}

#[test]
fn telnet_negotiation_replies_are_ignored() {
    let (mut manager, _events, addr) = loopback_manager();
    let (mut client, mut seen) = connect(addr);

    // DO SGA, DO ECHO, then a NAWS subnegotiation, interleaved with typing.
    client.write_all(&[255, 253, 3, b'h', 255, 253, 1, b'i', 255, 250, 31, 0, 80, 0, 24, 255, 240]).unwrap();
    client.write_all(b"\t\r\n").unwrap();
    read_until(&mut client, &mut seen, "CLI> history \r\n    1  history\r\n");

    manager.shutdown();
}

#[test]
fn sessions_keep_separate_histories() {
    let (mut manager, _events, addr) = loopback_manager();
    let (mut a, mut seen_a) = connect(addr);
    let (mut b, mut seen_b) = connect(addr);

    a.write_all(b"help\r").unwrap();
    read_until(&mut a, &mut seen_a, "Display this text");
    b.write_all(b"history\r").unwrap();
    let out_b = read_until(&mut b, &mut seen_b, "    1  history\r\n");
    a.write_all(b"history\r").unwrap();
    read_until(&mut a, &mut seen_a, "    1  help\r\n    2  history\r\n");

    assert!(!out_b.contains("2  "));
    assert_eq!(manager.session_ids().len(), 2);
    manager.shutdown();
}

#[test]
fn shutdown_command_requests_process_quit() {
    let (mut manager, events, addr) = loopback_manager();
    let (mut client, mut seen) = connect(addr);

    client.write_all(b"shutdown\r").unwrap();
    read_until(&mut client, &mut seen, "Shutting down.");
    match events.recv_timeout(EVENT_TIMEOUT).unwrap() {
        SessionEvent::QuitRequested { .. } => {}
        other => panic!("unexpected event {other:?}"),
    }

    manager.shutdown();
    assert!(manager.session_ids().is_empty());
}
