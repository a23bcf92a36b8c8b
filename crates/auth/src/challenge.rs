//! Server-Challenge fuer den Handshake
//!
//! Jede Challenge wird genau einmal verwendet. Nach einem Fehlversuch
//! erzeugt der Server eine neue.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

use crate::error::{AuthError, AuthResult};

/// Laenge einer Challenge in Bytes
pub const CHALLENGE_SIZE: usize = 32;

#[derive(Clone, PartialEq, Eq)]
pub struct Challenge([u8; CHALLENGE_SIZE]);

impl Challenge {
    /// Erzeugt eine kryptografisch zufaellige Challenge
    pub fn generieren() -> Self {
        let mut bytes = [0u8; CHALLENGE_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn aus_bytes(bytes: [u8; CHALLENGE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Liest eine Base64-kodierte Challenge (Client-Seite, Tests)
    pub fn aus_base64(text: &str) -> AuthResult<Self> {
        let bytes = STANDARD.decode(text)?;
        let bytes: [u8; CHALLENGE_SIZE] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| AuthError::ChallengeLaenge(b.len()))?;
        Ok(Self(bytes))
    }

    pub fn als_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// Inhalt nie loggen
impl std::fmt::Debug for Challenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Challenge(..)")
    }
}
