//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

use crate::store::StoreError;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// One or more configuration options failed validation
    #[error("Invalid configuration: {}", .0.join(", "))]
    InvalidConfiguration(Vec<String>),

    /// The cache has been closed
    #[error("Cache is closed")]
    Closed,

    /// The backing store failed
    #[error("Storage failure: {0}")]
    Storage(StoreError),

    /// A value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Payload compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(#[from] std::io::Error),

    /// No async runtime, or a blocking store task died
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl CacheError {
    /// Field names reported by an `InvalidConfiguration` error.
    pub fn invalid_fields(&self) -> &[String] {
        match self {
            CacheError::InvalidConfiguration(fields) => fields,
            _ => &[],
        }
    }
}

// A store that has been released reports the same terminal state as the cache.
impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Closed => CacheError::Closed,
            other => CacheError::Storage(other),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
