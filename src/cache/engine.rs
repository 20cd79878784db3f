//! Cache Engine
//!
//! Public cache handle: validates its state on every call, serializes and
//! compresses values, and drives the store and the sweeper.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{error, info};

use crate::cache::compression;
use crate::cache::{CacheStats, Codec, JsonCodec, Lifecycle, StatsRecorder};
use crate::config::{CacheOptions, Config};
use crate::error::{CacheError, Result};
use crate::store::{current_timestamp_ms, SqliteStore, Store, StoreResult};
use crate::tasks::{SweepReport, SweepTarget, Sweeper};

// == Set Options ==
/// Per-write overrides of the configured defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// TTL for this entry, falls back to `Config::default_ttl`
    pub ttl: Option<Duration>,
    /// Request compression, falls back to `Config::compress`
    pub compress: Option<bool>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }
}

// == Cached Value ==
/// A value read back together with how it was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedValue<T> {
    pub key: String,
    pub value: T,
    /// Whether compression was actually applied, not merely requested
    pub compressed: bool,
}

// == Cache ==
/// Embedded key-value cache with TTL expiration and LRU capacity eviction.
///
/// Every operation except [`Cache::close`] and [`Cache::is_closed`] fails
/// with [`CacheError::Closed`] once the cache has been closed.
pub struct Cache<C: Codec = JsonCodec> {
    config: Config,
    store: Arc<dyn Store>,
    codec: C,
    lifecycle: Arc<Lifecycle>,
    stats: Arc<StatsRecorder>,
    sweeper: Sweeper,
}

impl Cache<JsonCodec> {
    // == Constructors ==
    /// Validates `options` and opens a SQLite backed cache.
    pub fn open(options: CacheOptions) -> Result<Self> {
        Self::from_config(options.validate()?)
    }

    /// Opens a cache from a loosely-typed JSON options bag.
    pub fn from_value(options: &serde_json::Value) -> Result<Self> {
        Self::from_config(Config::from_value(options)?)
    }

    /// Opens a SQLite backed cache for an already validated configuration.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config(config: Config) -> Result<Self> {
        // Checked before the store is opened so a failure leaves nothing behind
        let runtime = current_runtime()?;
        let store = SqliteStore::open(&config.database)?;
        Ok(Self::start(runtime, config, Arc::new(store), JsonCodec))
    }
}

impl<C: Codec> Cache<C> {
    /// Builds a cache over any [`Store`] and [`Codec`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_store<S: Store>(config: Config, store: S, codec: C) -> Result<Self> {
        let runtime = current_runtime()?;
        Ok(Self::start(runtime, config, Arc::new(store), codec))
    }

    fn start(runtime: Handle, config: Config, store: Arc<dyn Store>, codec: C) -> Self {
        let lifecycle = Arc::new(Lifecycle::new());
        let stats = Arc::new(StatsRecorder::new());

        let target = SweepTarget {
            store: Arc::clone(&store),
            lifecycle: Arc::clone(&lifecycle),
            stats: Arc::clone(&stats),
            max_items: config.max_items,
        };
        let sweeper = Sweeper::spawn(&runtime, target, config.sweep_interval);

        info!(
            "Cache opened: database={:?}, default_ttl={:?}, max_items={:?}, compress={}",
            config.database, config.default_ttl, config.max_items, config.compress
        );

        Self {
            config,
            store,
            codec,
            lifecycle,
            stats,
            sweeper,
        }
    }

    // == Get ==
    /// Returns the live value stored under `key`, refreshing its recency.
    ///
    /// Absent or expired keys yield `Ok(None)`. Store and decoding failures
    /// are returned to the caller.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self.get_with_meta(key).await?.map(|cached| cached.value))
    }

    /// Like [`Cache::get`], also reporting whether the payload was compressed.
    pub async fn get_with_meta<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<CachedValue<T>>> {
        self.lifecycle.ensure_open()?;

        let now = current_timestamp_ms();
        let lookup = key.to_string();
        let fetched = self
            .blocking(move |store| store.touch_and_fetch(&lookup, now))
            .await?;

        let Some(stored) = fetched else {
            self.stats.record_miss();
            return Ok(None);
        };
        self.stats.record_hit();

        let compressed = stored.compressed;
        let bytes = compression::decode(stored)?;
        let value = self.codec.decode(&bytes)?;

        Ok(Some(CachedValue {
            key: key.to_string(),
            value,
            compressed,
        }))
    }

    // == Set ==
    /// Stores `value` under `key` with the configured defaults.
    ///
    /// See [`Cache::set_with`] for the result contract.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<bool> {
        self.set_with(key, value, SetOptions::default()).await
    }

    /// Stores `value` under `key`, replacing any existing entry.
    ///
    /// Writes are best-effort: a store, codec or compression failure is
    /// logged and reported as `Ok(false)`. Only a closed cache is an error.
    /// Every write also schedules a sweep.
    pub async fn set_with<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> Result<bool> {
        self.lifecycle.ensure_open()?;

        let outcome = self.write(key, value, options).await;
        if let Err(CacheError::Closed) = outcome {
            return Err(CacheError::Closed);
        }
        self.sweeper.trigger();

        match outcome {
            Ok(()) => {
                self.stats.record_write();
                Ok(true)
            }
            Err(err) => {
                self.stats.record_write_failure();
                error!("Failed to set cache key {}: {}", key, err);
                Ok(false)
            }
        }
    }

    async fn write<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> Result<()> {
        let serialized = self.codec.encode(value)?;
        let requested = options.compress.unwrap_or(self.config.compress);
        let stored = compression::encode(requested, serialized)?;

        let now = current_timestamp_ms();
        let expires_at = options
            .ttl
            .or(self.config.default_ttl)
            .map(|ttl| now.saturating_add(duration_ms(ttl)));

        let key = key.to_string();
        self.blocking(move |store| store.upsert(&key, stored, expires_at, now))
            .await
    }

    // == Delete ==
    /// Removes `key`. Missing keys are not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.lifecycle.ensure_open()?;
        let key = key.to_string();
        self.blocking(move |store| store.delete_key(&key)).await
    }

    // == Clear ==
    /// Removes every entry.
    pub async fn clear(&self) -> Result<()> {
        self.lifecycle.ensure_open()?;
        self.blocking(|store| store.delete_all()).await
    }

    // == Close ==
    /// Stops the sweeper and releases the store. Later calls are no-ops.
    pub async fn close(&self) -> Result<()> {
        if !self.lifecycle.close() {
            return Ok(());
        }

        self.sweeper.stop();
        self.blocking(|store| store.close()).await?;

        info!("Cache closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    // == Maintenance ==
    /// Runs one sweep pass now instead of waiting for the next tick.
    pub async fn sweep(&self) -> Result<SweepReport> {
        SweepTarget {
            store: Arc::clone(&self.store),
            lifecycle: Arc::clone(&self.lifecycle),
            stats: Arc::clone(&self.stats),
            max_items: self.config.max_items,
        }
        .run()
        .await
    }

    /// Number of rows in the store, including expired rows not yet swept.
    pub async fn len(&self) -> Result<usize> {
        self.lifecycle.ensure_open()?;
        self.blocking(|store| store.len()).await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs a store operation on the blocking pool and waits for it.
    async fn blocking<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&dyn Store) -> StoreResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| CacheError::Runtime(e.to_string()))?;
        Ok(result?)
    }
}

fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|e| CacheError::Runtime(e.to_string()))
}

fn duration_ms(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}
