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

use std::io::{self, Write as _};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context as _;

use super::{SessionEvent, SessionExit, SessionHandle, SessionId, Shared, Teardown, run_session};
use crate::config::RetryPolicy;
use crate::editor::keymap::{IAC, TELOPT_ECHO, TELOPT_SGA, WILL};
use crate::editor::{Editor, EditorOptions};

/// Sent to every new connection: the server will echo and suppress go-ahead,
/// which puts common clients into character-at-a-time mode.
pub const HANDSHAKE: [u8; 6] = [IAC, WILL, TELOPT_SGA, IAC, WILL, TELOPT_ECHO];

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// The listening socket and the thread blocked on it.
pub(crate) struct Acceptor {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Acceptor {
    pub(super) fn start(shared: &Shared) -> anyhow::Result<Self> {
        let listener = bind_with_retry(shared.config.listen, shared.config.bind_retry)?;
        let addr = listener.local_addr().context("failed to read telnet listener address")?;
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let shared = shared.clone();
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("telnet-acceptor".to_owned())
                .spawn(move || accept_loop(&listener, &shared, &stop))
                .context("failed to spawn telnet acceptor thread")?
        };
        tracing::info!(%addr, "listening for telnet connections");
        Ok(Self { addr, stop, thread: Some(thread) })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and wait for the acceptor thread.
    pub(super) fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // A blocked accept() only returns when something connects.
        if let Err(err) = TcpStream::connect_timeout(&wake_addr(self.addr), WAKE_TIMEOUT) {
            tracing::debug!(error = %err, "acceptor wake-up connect failed");
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("telnet acceptor thread panicked");
        }
        tracing::info!(addr = %self.addr, "telnet acceptor stopped");
    }
}

fn bind_with_retry(addr: SocketAddr, policy: RetryPolicy) -> anyhow::Result<TcpListener> {
    let mut attempts = 0_u32;
    loop {
        match TcpListener::bind(addr) {
            Ok(listener) => return Ok(listener),
            Err(err) => {
                attempts += 1;
                if !policy.allows(attempts) {
                    tracing::error!(%addr, attempts, error = %err, "giving up on telnet listener");
                    return Err(err).with_context(|| format!("failed to bind {addr} after {attempts} attempts"));
                }
                tracing::warn!(%addr, attempt = attempts, error = %err, "bind failed, retrying");
                thread::sleep(policy.delay());
            }
        }
    }
}

/// Where to connect to reach a listener bound to `addr`.
fn wake_addr(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}

fn accept_loop(listener: &TcpListener, shared: &Shared, stop: &AtomicBool) {
    let limit = shared.config.accept_max_consecutive_failures;
    let delay = shared.config.bind_retry.delay();
    let mut failures = 0_u32;

    for conn in listener.incoming() {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        match conn {
            Ok(stream) => {
                failures = 0;
                if let Err(err) = spawn_session(stream, shared) {
                    tracing::warn!(error = %err, "failed to start telnet session");
                }
            }
            Err(err) => {
                failures += 1;
                if failures > limit {
                    tracing::error!(failures, error = %err, "too many accept failures, stopping acceptor");
                    shared.notify(SessionEvent::AcceptorStopped { reason: err.to_string() });
                    return;
                }
                tracing::warn!(failures, error = %err, "accept failed, retrying");
                thread::sleep(delay);
            }
        }
    }
    tracing::debug!("acceptor loop finished");
}

fn spawn_session(stream: TcpStream, shared: &Shared) -> anyhow::Result<SessionId> {
    let id = shared.next_id();
    let peer = stream.peer_addr().context("connection has no peer address")?;
    let teardown = stream.try_clone().context("failed to clone telnet stream")?;
    let session = shared.clone();

    // The thread removes its own entry on exit; hold the table so the insert lands first.
    let mut table = shared.table();
    let thread = thread::Builder::new()
        .name(format!("session-{id}"))
        .spawn(move || run(stream, &session, id))
        .context("failed to spawn telnet session thread")?;
    table.insert(id, SessionHandle { thread, teardown: Teardown::Socket(teardown) });
    tracing::info!(session = %id, %peer, "telnet session started");
    Ok(id)
}

fn open_editor(stream: &mut TcpStream, shared: &Shared, id: SessionId) -> io::Result<Editor> {
    stream.write_all(&HANDSHAKE)?;
    let reader = stream.try_clone()?;
    let writer = stream.try_clone()?;
    let options = EditorOptions {
        interactive: true,
        telnet: true,
        width: shared.config.remote_terminal_width,
        max_line_length: shared.config.max_line_length,
        history_limit: Some(shared.config.remote_history_limit),
    };
    Ok(Editor::new(id, Box::new(reader), Box::new(writer), shared.keymap(), &options))
}

fn run(mut stream: TcpStream, shared: &Shared, id: SessionId) {
    let exit = match open_editor(&mut stream, shared, id) {
        Ok(mut editor) => {
            let exit = run_session(&mut editor, &shared.registry, &shared.config.prompt);
            editor.terminate();
            exit
        }
        Err(err) => {
            tracing::warn!(session = %id, error = %err, "telnet handshake failed");
            SessionExit::Closed
        }
    };
    if let Err(err) = stream.shutdown(Shutdown::Both) {
        tracing::debug!(session = %id, error = %err, "socket already closed");
    }
    shared.table().remove(&id);

    tracing::info!(session = %id, ?exit, "telnet session ended");
    let event = match exit {
        SessionExit::Shutdown => SessionEvent::QuitRequested { from: id },
        SessionExit::Closed => SessionEvent::SessionEnded { id },
    };
    shared.notify(event);
}
