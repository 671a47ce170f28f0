//! Server-assigned session token shared by both carriers.

use std::sync::{Arc, Mutex, PoisonError};

/// Session token length on the wire.
pub const SESSION_TOKEN_LEN: usize = 6;

/// A session token. All zeros means "no session yet".
pub type SessionToken = [u8; SESSION_TOKEN_LEN];

/// The all-zero token.
pub const NO_SESSION: SessionToken = [0; SESSION_TOKEN_LEN];

/// Shared slot holding the current token.
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    token: Arc<Mutex<SessionToken>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token (zeros if none).
    pub fn get(&self) -> SessionToken {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, token: SessionToken) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn clear(&self) {
        self.set(NO_SESSION);
    }

    pub fn is_set(&self) -> bool {
        self.get() != NO_SESSION
    }

    /// Current token, or `None` when no session has been assigned.
    pub fn token(&self) -> Option<SessionToken> {
        Some(self.get()).filter(|t| *t != NO_SESSION)
    }
}
