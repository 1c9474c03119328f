//! Content hashing for idempotent indexing.

use sha2::{Digest, Sha256};

/// First 8 hex chars of the SHA-256 digest of `content`.
///
/// Used as the change-detection key for index records: identical content
/// hashes to the same value, so re-indexing an unchanged file is a no-op.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(8);
    hash
}

/// Stable 16-hex-char record id derived from an identity key.
///
/// Parts are length-delimited so `("ab", "c")` and `("a", "bc")` disagree.
#[must_use]
pub fn record_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let mut id = hex::encode(hasher.finalize());
    id.truncate(16);
    id
}
