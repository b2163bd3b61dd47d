//! Hashing helpers for content-addressed cache paths.

use sha2::{Digest, Sha256};

/// Length of the truncated hex digest used in cache paths.
pub const SHORT_HASH_LEN: usize = 16;

/// Full lowercase hex SHA-256 of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

/// Truncated SHA-256, short enough to keep paths readable.
pub fn short_hash(bytes: &[u8]) -> String {
  hash_bytes(bytes)[..SHORT_HASH_LEN].to_string()
}
