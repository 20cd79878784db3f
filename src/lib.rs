//! Mini Cache - An embedded key-value cache
//!
//! String keyed storage of serializable values with TTL expiration, LRU
//! capacity eviction and optional transparent compression, backed by SQLite
//! in memory or on disk.

pub mod cache;
pub mod config;
pub mod error;
pub mod store;
pub mod tasks;

pub use cache::{Cache, CacheStats, CachedValue, Codec, JsonCodec, SetOptions};
pub use config::{CacheOptions, Config, Database};
pub use error::{CacheError, Result};
pub use store::{MemoryStore, SqliteStore, Store, StoreError};
pub use tasks::SweepReport;
