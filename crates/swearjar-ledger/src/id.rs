//! Identifier and clock helpers.

use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a fresh opaque identifier.
///
/// Blake3 of 32 random bytes and the current time, hex encoded (64 chars).
/// Fixed length matters: storage keys embed ids as prefixes.
pub fn generate_id() -> String {
    let mut nonce = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut nonce);

    let mut hasher = blake3::Hasher::new();
    hasher.update(&nonce);
    hasher.update(&now_millis().to_le_bytes());
    hex::encode(hasher.finalize().as_bytes())
}

/// Milliseconds since the Unix epoch (0 if the clock is before it).
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
