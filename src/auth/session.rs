use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use super::token::{generate_session_token, hash_session_token, parse_token};
use crate::error::{Error, Result};

/// Registry of issued bearer tokens.
///
/// Each call is atomic on its own; nothing is guaranteed across calls.
pub trait SessionStore: Send + Sync {
    /// Issues a fresh token bound to `user_id`. `None` means it never expires.
    fn issue(&self, user_id: &str, ttl: Option<Duration>) -> Result<String>;

    /// Resolves a token to its user id. Unknown, malformed and expired tokens
    /// all resolve to `None`.
    fn lookup(&self, token: &str) -> Result<Option<String>>;

    /// Revokes a token. Unknown tokens are ignored.
    fn revoke(&self, token: &str) -> Result<()>;
}

/// Absolute expiry for a token issued at `now`.
pub fn expiry(now: DateTime<Utc>, ttl: Option<Duration>) -> Result<Option<DateTime<Utc>>> {
    ttl.map(|ttl| {
        now.checked_add_signed(ttl)
            .ok_or_else(|| Error::Internal(format!("session lifetime {ttl} overflows")))
    })
    .transpose()
}

struct SessionEntry {
    user_id: String,
    expires_at: Option<DateTime<Utc>>,
}

/// In-process registry keyed by token hash.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn issue(&self, user_id: &str, ttl: Option<Duration>) -> Result<String> {
        let expires_at = expiry(Utc::now(), ttl)?;
        let token = generate_session_token();
        let entry = SessionEntry {
            user_id: user_id.to_string(),
            expires_at,
        };

        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(hash_session_token(&token), entry);

        Ok(token)
    }

    fn lookup(&self, token: &str) -> Result<Option<String>> {
        if parse_token(token).is_err() {
            return Ok(None);
        }
        let key = hash_session_token(token);

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let expired = match sessions.get(&key) {
            None => return Ok(None),
            Some(entry) => entry.expires_at.is_some_and(|at| at < Utc::now()),
        };

        if expired {
            sessions.remove(&key);
            return Ok(None);
        }

        Ok(sessions.get(&key).map(|entry| entry.user_id.clone()))
    }

    fn revoke(&self, token: &str) -> Result<()> {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&hash_session_token(token));
        Ok(())
    }
}
