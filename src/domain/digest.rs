//! Content digests for log deduplication.
//!
//! A digest identifies a class of records by their stable content:
//! - Level
//! - Message
//! - Attribute keys and values, sorted by key
//!
//! Volatile attributes (timestamps, call-site information) and the engine's own
//! marker attributes are excluded, since they differ on every call and would
//! otherwise defeat deduplication.

use crate::domain::record::Record;
use sha2::{Digest, Sha256};
use std::fmt;

/// Attribute added to decorated and summary records: occurrences in the window.
pub const DUPLICATE_COUNT_KEY: &str = "duplicate_count";
/// Attribute added to decorated and summary records: start of the window.
pub const FIRST_SEEN_KEY: &str = "first_seen";
/// Attribute added to decorated and summary records: last occurrence in the window.
pub const LAST_SEEN_KEY: &str = "last_seen";
/// Attribute carried only by sweep summaries.
pub const ORIGINAL_MSG_KEY: &str = "original_msg";

/// Attribute keys that never contribute to a digest.
pub const EXCLUDED_KEYS: &[&str] = &[
    "ts",
    "time",
    "caller",
    "source",
    "original.time",
    "original.source",
    DUPLICATE_COUNT_KEY,
    FIRST_SEEN_KEY,
    LAST_SEEN_KEY,
    ORIGINAL_MSG_KEY,
];

/// Whether an attribute key is ignored when computing digests.
pub fn is_excluded(key: &str) -> bool {
    EXCLUDED_KEYS.contains(&key)
}

/// SHA-256 fingerprint of a record's stable content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Compute the digest of a record.
    ///
    /// Pure and lock-free; safe to call on the hot path. Attribute insertion
    /// order does not affect the result. Attributes sharing a key keep their
    /// relative order.
    pub fn of(record: &Record) -> Self {
        let mut pairs: Vec<(&str, String)> = Vec::with_capacity(record.attrs.len() + 2);
        pairs.push(("level", record.level.as_str().to_string()));
        pairs.push(("msg", record.message.clone()));
        pairs.extend(
            record
                .attrs
                .iter()
                .filter(|attr| !is_excluded(&attr.key))
                .map(|attr| (attr.key.as_str(), attr.value.to_string())),
        );
        // Stable: duplicate keys keep insertion order.
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let mut hasher = Sha256::new();
        for (key, value) in &pairs {
            // Length prefixes keep ("ab","c") distinct from ("a","bc").
            hasher.update((key.len() as u64).to_le_bytes());
            hasher.update(key.as_bytes());
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        ContentDigest(hasher.finalize().into())
    }

}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", &hex::encode(self.0)[..16])
    }
}
