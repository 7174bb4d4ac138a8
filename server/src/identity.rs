//! Deterministic user identifiers.

use sha2::{Digest, Sha256};

/// Case-fold a username into the form used for storage and lookups.
///
/// Returns `None` for a blank username.
pub fn normalize_username(username: &str) -> Option<String> {
    let trimmed = username.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

/// Hex SHA-256 of the normalized username. The same username always maps to
/// the same id regardless of casing or surrounding whitespace.
#[cfg(test)]
pub fn user_id(username: &str) -> Option<String> {
    resolve(username).map(|(_, id)| id)
}

/// The normalized username together with its id.
pub fn resolve(username: &str) -> Option<(String, String)> {
    normalize_username(username).map(|name| {
        let id = sha256_hex(name.as_bytes());
        (name, id)
    })
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// True if `s` looks like an id produced by [`resolve`].
pub fn is_user_id(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
