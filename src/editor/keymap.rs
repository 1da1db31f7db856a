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

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Editor;

/// Keys that arrive as escape sequences rather than single bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKey {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Delete,
}

/// One decoded input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A single raw byte: ASCII, control characters, or a stray non-UTF-8 byte.
    Byte(u8),
    /// A multi-byte UTF-8 character.
    Char(char),
    Special(SpecialKey),
}

impl Key {
    /// The character a self-insert should add, if this key is printable.
    #[must_use]
    pub fn printable(self) -> Option<char> {
        match self {
            Self::Byte(b) if (0x20..0x7f).contains(&b) => Some(char::from(b)),
            Self::Char(c) if !c.is_control() => Some(c),
            _ => None,
        }
    }
}

/// The byte produced by holding Ctrl with `c`.
#[must_use]
pub const fn ctrl(c: u8) -> u8 {
    c & 0x1f
}

/// Something a key can be bound to. Returning `false` means the action could not be
/// carried out; the editor rings the bell and keeps reading.
pub trait KeyAction: Send + Sync {
    fn handle(&self, editor: &mut Editor, key: Key) -> bool;
}

impl<F> KeyAction for F
where
    F: Fn(&mut Editor, Key) -> bool + Send + Sync,
{
    fn handle(&self, editor: &mut Editor, key: Key) -> bool {
        self(editor, key)
    }
}

pub type BoundAction = Arc<dyn KeyAction>;

/// Bindings for one editor instance. Later bindings replace earlier ones.
#[derive(Clone, Default)]
pub struct Keymap {
    bindings: HashMap<u8, BoundAction>,
    special: HashMap<SpecialKey, BoundAction>,
}

impl Keymap {
    /// A keymap with nothing bound; every printable key still self-inserts.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard emacs-style editing bindings.
    pub fn with_defaults() -> Self {
        let mut keymap = Self::empty();
        super::actions::install_defaults(&mut keymap);
        keymap
    }

    pub fn bind(&mut self, key: u8, action: impl KeyAction + 'static) -> &mut Self {
        self.bindings.insert(key, Arc::new(action));
        self
    }

    pub fn bind_special(&mut self, key: SpecialKey, action: impl KeyAction + 'static) -> &mut Self {
        self.special.insert(key, Arc::new(action));
        self
    }

    pub fn lookup(&self, key: Key) -> Option<BoundAction> {
        match key {
            Key::Byte(b) => self.bindings.get(&b).cloned(),
            Key::Special(special) => self.special.get(&special).cloned(),
            Key::Char(_) => None,
        }
    }
}

impl fmt::Debug for Keymap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bytes: Vec<_> = self.bindings.keys().copied().collect();
        bytes.sort_unstable();
        f.debug_struct("Keymap")
            .field("bindings", &bytes)
            .field("special", &self.special.keys().collect::<Vec<_>>())
            .finish()
    }
}

const ESC: u8 = 0x1b;
/// Parameter and intermediate bytes kept for one control sequence.
const MAX_CSI_PARAMS: usize = 16;

// Telnet command bytes (RFC 854).
pub(crate) const IAC: u8 = 255;
pub(crate) const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;
const WILL_TO_DONT: std::ops::RangeInclusive<u8> = 251..=254;
pub(crate) const TELOPT_ECHO: u8 = 1;
pub(crate) const TELOPT_SGA: u8 = 3;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
enum DecodeState {
    #[default]
    Ground,
    Escape,
    Csi(Vec<u8>),
    Ss3,
    Utf8 {
        bytes: Vec<u8>,
        needed: usize,
    },
    Iac,
    IacOption,
    Subnegotiation,
    SubnegotiationIac,
}

/// Turns the raw byte stream into [`Key`] events.
///
/// Escape sequences and UTF-8 characters are assembled across calls. With telnet
/// filtering on, protocol commands from the peer are swallowed.
#[derive(Debug, Default)]
pub struct KeyDecoder {
    state: DecodeState,
    telnet: bool,
    after_cr: bool,
}

impl KeyDecoder {
    pub fn new(telnet: bool) -> Self {
        Self { state: DecodeState::Ground, telnet, after_cr: false }
    }

    pub fn feed(&mut self, byte: u8) -> Option<Key> {
        match std::mem::take(&mut self.state) {
            DecodeState::Ground => self.ground(byte),
            DecodeState::Escape => {
                match byte {
                    b'[' => self.state = DecodeState::Csi(Vec::new()),
                    b'O' => self.state = DecodeState::Ss3,
                    _ => tracing::debug!(byte, "dropping unsupported escape sequence"),
                }
                None
            }
            DecodeState::Csi(mut params) => match byte {
                0x40..=0x7e => csi_key(&params, byte).map(Key::Special),
                0x20..=0x3f if params.len() < MAX_CSI_PARAMS => {
                    params.push(byte);
                    self.state = DecodeState::Csi(params);
                    None
                }
                _ => {
                    tracing::debug!(byte, len = params.len(), "dropping malformed control sequence");
                    None
                }
            },
            DecodeState::Ss3 => csi_key(&[], byte).map(Key::Special),
            DecodeState::Utf8 { mut bytes, needed } => {
                if byte & 0xc0 != 0x80 {
                    // Truncated sequence: drop it and treat this byte afresh.
                    return self.ground(byte);
                }
                bytes.push(byte);
                if bytes.len() < needed {
                    self.state = DecodeState::Utf8 { bytes, needed };
                    return None;
                }
                std::str::from_utf8(&bytes).ok().and_then(|s| s.chars().next()).map(Key::Char)
            }
            DecodeState::Iac => match byte {
                IAC => Some(Key::Byte(IAC)),
                SB => {
                    self.state = DecodeState::Subnegotiation;
                    None
                }
                b if WILL_TO_DONT.contains(&b) => {
                    self.state = DecodeState::IacOption;
                    None
                }
                _ => None,
            },
            DecodeState::IacOption => None,
            DecodeState::Subnegotiation => {
                if byte == IAC {
                    self.state = DecodeState::SubnegotiationIac;
                } else {
                    self.state = DecodeState::Subnegotiation;
                }
                None
            }
            DecodeState::SubnegotiationIac => {
                if byte != SE {
                    self.state = DecodeState::Subnegotiation;
                }
                None
            }
        }
    }

    fn ground(&mut self, byte: u8) -> Option<Key> {
        if self.telnet && byte == IAC {
            self.state = DecodeState::Iac;
            return None;
        }
        let after_cr = std::mem::replace(&mut self.after_cr, byte == b'\r');
        if after_cr && (byte == b'\n' || byte == 0) {
            return None;
        }
        match byte {
            ESC => {
                self.state = DecodeState::Escape;
                None
            }
            0x00..=0x7f => Some(Key::Byte(byte)),
            0xc0..=0xdf => self.start_utf8(byte, 2),
            0xe0..=0xef => self.start_utf8(byte, 3),
            0xf0..=0xf7 => self.start_utf8(byte, 4),
            _ => Some(Key::Byte(byte)),
        }
    }

    fn start_utf8(&mut self, lead: u8, needed: usize) -> Option<Key> {
        self.state = DecodeState::Utf8 { bytes: vec![lead], needed };
        None
    }
}

fn csi_key(params: &[u8], final_byte: u8) -> Option<SpecialKey> {
    let key = match (params, final_byte) {
        (_, b'A') => SpecialKey::Up,
        (_, b'B') => SpecialKey::Down,
        (_, b'C') => SpecialKey::Right,
        (_, b'D') => SpecialKey::Left,
        (_, b'H') | (b"1" | b"7", b'~') => SpecialKey::Home,
        (_, b'F') | (b"4" | b"8", b'~') => SpecialKey::End,
        (b"3", b'~') => SpecialKey::Delete,
        _ => {
            tracing::debug!(?params, final_byte, "unbound escape sequence");
            return None;
        }
    };
    Some(key)
}
