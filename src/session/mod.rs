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

//! Session manager: one thread per editor instance, plus the telnet acceptor.

pub mod local;
pub mod telnet;

use std::collections::HashMap;
use std::fmt;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::commands::{Directive, Registry};
use crate::config::Config;
use crate::editor::Editor;
use crate::editor::actions::bind_completion;
use crate::editor::complete::NameSource;
use crate::editor::keymap::Keymap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notifications from sessions and the acceptor to whoever owns the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    QuitRequested { from: SessionId },
    SessionEnded { id: SessionId },
    AcceptorStopped { reason: String },
}

/// Why a session loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// Stream closed, end of input or `quit`.
    Closed,
    /// A command asked for the whole process to stop.
    Shutdown,
}

/// How the manager unblocks a session thread at shutdown.
enum Teardown {
    Socket(TcpStream),
    /// Stdin cannot be interrupted. `finished` is set once the local loop returned.
    Terminal { finished: Arc<AtomicBool> },
}

struct SessionHandle {
    thread: JoinHandle<()>,
    teardown: Teardown,
}

impl SessionHandle {
    fn close(self, id: SessionId) {
        match self.teardown {
            Teardown::Socket(stream) => {
                if let Err(err) = stream.shutdown(Shutdown::Both) {
                    tracing::debug!(session = %id, error = %err, "socket already closed");
                }
            }
            Teardown::Terminal { finished } => {
                if !finished.load(Ordering::Acquire) {
                    local::restore_terminal();
                    tracing::info!(session = %id, "local session still blocked on input, not waiting for it");
                    return;
                }
            }
        }
        if self.thread.join().is_err() {
            tracing::warn!(session = %id, "session thread panicked");
        }
    }
}

/// State shared by the manager, the acceptor and every session thread.
#[derive(Clone)]
pub(crate) struct Shared {
    config: Arc<Config>,
    registry: Arc<Registry>,
    sessions: Arc<Mutex<HashMap<SessionId, SessionHandle>>>,
    next_id: Arc<AtomicU64>,
    events: Sender<SessionEvent>,
}

impl Shared {
    fn next_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn table(&self) -> MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Default bindings plus completion against the shared registry.
    fn keymap(&self) -> Keymap {
        let names: Arc<dyn NameSource> = self.registry.clone();
        let mut keymap = Keymap::with_defaults();
        bind_completion(&mut keymap, &names);
        keymap
    }

    fn notify(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("session event receiver is gone");
        }
    }
}

/// Drive one editor until its stream ends or a command ends the session.
///
/// Non-blank lines go into the session's history before they run.
pub fn run_session(editor: &mut Editor, registry: &Registry, prompt: &str) -> SessionExit {
    loop {
        let line = match editor.readline(prompt) {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!(session = %editor.id(), "end of input");
                return SessionExit::Closed;
            }
            Err(err) => {
                tracing::info!(session = %editor.id(), error = %err, "session stream ended");
                return SessionExit::Closed;
            }
        };
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if let Some(history) = editor.history_mut() {
            history.add(command);
        }
        match registry.execute(editor, command) {
            Directive::Continue => {}
            Directive::EndSession => return SessionExit::Closed,
            Directive::Shutdown => return SessionExit::Shutdown,
        }
    }
}

/// Owns every session thread and the telnet acceptor.
pub struct SessionManager {
    shared: Shared,
    acceptor: Option<telnet::Acceptor>,
    local: Option<SessionId>,
}

impl SessionManager {
    pub fn new(config: Config, registry: Registry) -> (Self, Receiver<SessionEvent>) {
        let (events, receiver) = mpsc::channel();
        let shared = Shared {
            config: Arc::new(config),
            registry: Arc::new(registry),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            events,
        };
        (Self { shared, acceptor: None, local: None }, receiver)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.shared.registry
    }

    /// Start the session on the process's own terminal.
    pub fn start_local(&mut self) -> anyhow::Result<SessionId> {
        let id = local::spawn(&self.shared)?;
        self.local = Some(id);
        Ok(id)
    }

    /// Bind the telnet listener and start accepting. Returns the bound address.
    pub fn start_telnet(&mut self) -> anyhow::Result<SocketAddr> {
        let acceptor = telnet::Acceptor::start(&self.shared)?;
        let addr = acceptor.local_addr();
        self.acceptor = Some(acceptor);
        Ok(addr)
    }

    #[must_use]
    pub fn is_local(&self, id: SessionId) -> bool {
        self.local == Some(id)
    }

    #[must_use]
    pub fn has_local(&self) -> bool {
        self.local.is_some()
    }

    /// Ids of the sessions still running, in creation order.
    #[must_use]
    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.shared.table().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Stop accepting, close every session stream and wait for the threads.
    pub fn shutdown(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.stop();
        }
        let drained: Vec<(SessionId, SessionHandle)> = self.shared.table().drain().collect();
        for (id, handle) in drained {
            handle.close(id);
        }
        if self.local.take().is_some() {
            tracing::debug!("local session released");
        }
        tracing::info!("all sessions shut down");
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if self.acceptor.is_some() || !self.shared.table().is_empty() {
            self.shutdown();
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.session_ids())
            .field("local", &self.local)
            .field("listening", &self.acceptor.as_ref().map(telnet::Acceptor::local_addr))
            .finish()
    }
}
