//! Store Module
//!
//! The narrow storage interface the cache core depends on, plus the two
//! engines that implement it: SQLite (in-memory or on disk) and a plain
//! in-memory map.

mod entry;
mod lru;
mod memory;
mod sqlite;

use thiserror::Error;

pub use entry::{current_timestamp_ms, CacheEntry, StoredValue};
pub use lru::LruTracker;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

// == Store Error ==
/// Failure reported by a storage engine.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite returned an error
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The store has been closed
    #[error("store is closed")]
    Closed,

    /// Any other engine failure
    #[error("{0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Store Trait ==
/// Storage capability consumed by the cache core.
///
/// Every method must be atomic on its own. Timestamps are Unix milliseconds.
pub trait Store: Send + Sync + 'static {
    /// Sets `last_access_at = now` and returns the payload, but only when the
    /// entry exists and `expires_at` is absent or later than `now`. Otherwise
    /// storage is left untouched.
    fn touch_and_fetch(&self, key: &str, now: i64) -> StoreResult<Option<StoredValue>>;

    /// Inserts or fully replaces the entry for `key`.
    fn upsert(
        &self,
        key: &str,
        value: StoredValue,
        expires_at: Option<i64>,
        now: i64,
    ) -> StoreResult<()>;

    /// Removes `key` if present.
    fn delete_key(&self, key: &str) -> StoreResult<()>;

    /// Removes every entry.
    fn delete_all(&self) -> StoreResult<()>;

    /// Removes entries whose `expires_at` is earlier than `now`.
    fn delete_expired(&self, now: i64) -> StoreResult<usize>;

    /// Keeps the `max_items` most recently accessed entries and removes the rest.
    fn delete_excess_by_recency(&self, max_items: usize) -> StoreResult<usize>;

    /// Number of rows held, including expired rows not yet swept.
    fn len(&self) -> StoreResult<usize>;

    /// True when the store holds no rows at all.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Releases the engine. Later calls fail with [`StoreError::Closed`].
    fn close(&self) -> StoreResult<()>;
}
