use std::collections::HashMap;
use std::sync::Mutex;

use rand::RngCore;
use serde::Serialize;

use crate::error::{AppError, Result};

pub const SESSION_COOKIE: &str = "cgpa_session";

/// Upper bound on live sessions; the oldest entry is evicted past it.
pub const MAX_SESSIONS: usize = 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Session {
    pub logged_in: bool,
    pub username: String,
    pub dark_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoginSucceeded { username: String },
    LoginFailed,
    Logout,
    ToggleTheme,
}

impl Session {
    /// Next session state after `event`. A failed login leaves the session
    /// as it was; logout resets it completely.
    pub fn apply(self, event: SessionEvent) -> Session {
        match event {
            SessionEvent::LoginSucceeded { username } => Session {
                logged_in: true,
                username,
                ..self
            },
            SessionEvent::LoginFailed => self,
            SessionEvent::Logout => Session::default(),
            SessionEvent::ToggleTheme => Session {
                dark_mode: !self.dark_mode,
                ..self
            },
        }
    }

    fn is_pristine(&self) -> bool {
        *self == Session::default()
    }
}

struct Entry {
    session: Session,
    seq: u64,
}

#[derive(Default)]
struct Table {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

impl Table {
    fn insert(&mut self, token: String, session: Session, capacity: usize) {
        if !self.entries.contains_key(&token) {
            while self.entries.len() >= capacity {
                let oldest = self
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.seq)
                    .map(|(t, _)| t.clone());
                match oldest {
                    Some(t) => {
                        self.entries.remove(&t);
                    }
                    None => break,
                }
            }
        }
        self.next_seq += 1;
        let seq = self.next_seq;
        self.entries.insert(token, Entry { session, seq });
    }
}

/// In-memory session table keyed by the opaque cookie token.
///
/// Only sessions that differ from the logged-out default are stored, and the
/// table never holds more than `capacity` entries.
pub struct SessionStore {
    table: Mutex<Table>,
    capacity: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_capacity(MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: Mutex::new(Table::default()),
            capacity: capacity.max(1),
        }
    }

    /// Session for `token`, or a fresh logged-out one when the token is unknown.
    pub fn get(&self, token: Option<&str>) -> Result<Session> {
        let Some(token) = token else {
            return Ok(Session::default());
        };
        let table = self.table.lock().map_err(|_| poisoned())?;
        Ok(table
            .entries
            .get(token)
            .map(|e| e.session.clone())
            .unwrap_or_default())
    }

    /// Stores `session` under `token` and returns the token it now lives
    /// under. Tokens this table never issued are replaced by a fresh one.
    /// A logged-out default session is dropped instead, returning `None`.
    pub fn commit(&self, token: Option<&str>, session: Session) -> Result<Option<String>> {
        let mut table = self.table.lock().map_err(|_| poisoned())?;
        if session.is_pristine() {
            if let Some(t) = token {
                table.entries.remove(t);
            }
            return Ok(None);
        }
        let token = match token {
            Some(t) if table.entries.contains_key(t) => t.to_string(),
            _ => new_token(),
        };
        table.insert(token.clone(), session, self.capacity);
        Ok(Some(token))
    }

    /// Moves `session` to a freshly minted token, discarding `old`.
    pub fn rotate(&self, old: Option<&str>, session: Session) -> Result<String> {
        let mut table = self.table.lock().map_err(|_| poisoned())?;
        if let Some(t) = old {
            table.entries.remove(t);
        }
        let token = new_token();
        table.insert(token.clone(), session, self.capacity);
        Ok(token)
    }

    pub fn len(&self) -> usize {
        self.table.lock().map(|t| t.entries.len()).unwrap_or(0)
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn poisoned() -> AppError {
    AppError::Store("session table lock poisoned".to_string())
}
