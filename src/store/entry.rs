//! Cache Entry Module
//!
//! Defines the stored payload and the row kept by in-memory stores.

use chrono::Utc;

// == Stored Value ==
/// Payload exactly as persisted: serialized, possibly compressed bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    /// Serialized (and maybe compressed) value
    pub bytes: Vec<u8>,
    /// Whether `bytes` must be decompressed before decoding
    pub compressed: bool,
}

impl StoredValue {
    /// Wraps bytes that were not compressed.
    pub fn plain(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            compressed: false,
        }
    }
}

// == Cache Entry ==
/// A single row with its expiry and recency metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored payload
    pub value: StoredValue,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<i64>,
    /// Last read or write (Unix milliseconds)
    pub last_access_at: i64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry written at `now`.
    pub fn new(value: StoredValue, expires_at: Option<i64>, now: i64) -> Self {
        Self {
            value,
            expires_at,
            last_access_at: now,
        }
    }

    // == Is Live ==
    /// Readable at `now`: no expiry, or an expiry strictly in the future.
    pub fn is_live_at(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |expires| expires > now)
    }

    // == Is Sweepable ==
    /// Due for removal by a sweep at `now`.
    pub fn is_expired_before(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|expires| expires < now)
    }

    // == Touch ==
    /// Records an access; never moves `last_access_at` backwards.
    pub fn touch(&mut self, now: i64) {
        self.last_access_at = self.last_access_at.max(now);
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}
