use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Generated identifiers look like `cr-k3x09ab2`: a fixed prefix plus eight
/// characters of lowercase base 36. Short enough for a dense QR code, and a
/// 36^8 space makes collisions across the expected tens of concurrent
/// sessions vanishingly unlikely.
const ID_PREFIX: &str = "cr-";
const ID_RANDOM_LEN: usize = 8;
const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Identifiers arriving from outside (URLs, broker paths) just need to be
/// URL-safe tokens of sane length; peers we did not mint ids for still get
/// to rendezvous.
const MAX_ID_LEN: usize = 64;

/// Rendezvous token for one pairing session.
///
/// This is not a secret protecting the payload, only an unguessable meeting
/// point: it must never come from a sequential counter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionIdError {
    #[error("session identifier is empty")]
    Empty,

    #[error("session identifier exceeds {MAX_ID_LEN} characters")]
    TooLong,

    #[error("session identifier contains a character outside the URL-safe set")]
    InvalidCharacter,
}

impl SessionId {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut id = String::with_capacity(ID_PREFIX.len() + ID_RANDOM_LEN);
        id.push_str(ID_PREFIX);
        for _ in 0..ID_RANDOM_LEN {
            let index = rng.gen_range(0..ID_ALPHABET.len());
            id.push(ID_ALPHABET[index] as char);
        }
        SessionId(id)
    }

    pub fn parse(raw: &str) -> Result<Self, SessionIdError> {
        if raw.is_empty() {
            return Err(SessionIdError::Empty);
        }
        if raw.len() > MAX_ID_LEN {
            return Err(SessionIdError::TooLong);
        }
        let url_safe = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
        if !raw.chars().all(url_safe) {
            return Err(SessionIdError::InvalidCharacter);
        }
        Ok(SessionId(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
