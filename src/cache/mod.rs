//! Cache Module
//!
//! The cache core with its codec, compression policy, lifecycle and counters.

mod codec;
pub mod compression;
mod engine;
mod state;
mod stats;


// Re-export public types
pub use codec::{Codec, JsonCodec};
pub use compression::COMPRESSION_MIN_LENGTH;
pub use engine::{Cache, CachedValue, SetOptions};
pub use state::{Lifecycle, State};
pub use stats::{CacheStats, StatsRecorder};
