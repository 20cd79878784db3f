//! Configuration Module
//!
//! Turns user supplied options into an immutable, fully defaulted [`Config`].
//!
//! Options arrive in one of three shapes: the typed [`CacheOptions`] builder,
//! a loosely-typed JSON options bag, or environment variables. All of them go
//! through the same validation, which reports every offending field at once.

use std::env;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Number, Value};

use crate::error::{CacheError, Result};

// == Public Constants ==
/// Location sentinel selecting a purely in-memory database
pub const MEMORY_DATABASE: &str = ":memory:";

/// Default interval between background sweeps, in milliseconds
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 500;

// == Database ==
/// Where the cache keeps its entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Database {
    /// Volatile storage, gone when the cache closes
    #[default]
    Memory,
    /// SQLite database file on disk
    File(PathBuf),
}

impl Database {
    /// Interprets a location string, honouring the in-memory sentinel.
    pub fn parse(location: &str) -> Self {
        if location == MEMORY_DATABASE {
            Database::Memory
        } else {
            Database::File(PathBuf::from(location))
        }
    }
}

// == Config ==
/// Effective cache configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Storage location
    pub database: Database,
    /// TTL applied to writes that do not carry their own, None = never expire
    pub default_ttl: Option<Duration>,
    /// Capacity bound enforced by the sweeper, None = unbounded
    pub max_items: Option<NonZeroUsize>,
    /// Whether writes request compression by default
    pub compress: bool,
    /// Cadence of the background sweeper
    pub sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: Database::Memory,
            default_ttl: None,
            max_items: None,
            compress: false,
            sweep_interval: Duration::from_millis(DEFAULT_SWEEP_INTERVAL_MS),
        }
    }
}

impl Config {
    /// Validates a loosely-typed options bag.
    ///
    /// Recognised fields are `database`, `defaultTtlMs`, `maxItems`, `compress`
    /// and `sweepIntervalMs`. A `null` field counts as absent and unknown
    /// fields are ignored.
    ///
    /// # Errors
    /// `InvalidConfiguration` naming every field with the wrong type or range.
    pub fn from_value(options: &Value) -> Result<Self> {
        let fields = match options {
            Value::Null => return Ok(Self::default()),
            Value::Object(fields) => fields,
            _ => return Err(CacheError::InvalidConfiguration(vec!["options".to_string()])),
        };

        let mut invalid = Vec::new();
        let mut opts = CacheOptions::new();

        match fields.get("database") {
            None | Some(Value::Null) => {}
            Some(Value::String(location)) => opts = opts.database(location.clone()),
            Some(_) => invalid.push("database"),
        }

        match fields.get("defaultTtlMs") {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) => match millis(n) {
                Some(ttl) => opts = opts.default_ttl(ttl),
                None => invalid.push("defaultTtlMs"),
            },
            Some(_) => invalid.push("defaultTtlMs"),
        }

        match fields.get("maxItems") {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) => {
                match positive_integer(n).and_then(|v| usize::try_from(v).ok()) {
                    Some(max) => opts = opts.max_items(max),
                    None => invalid.push("maxItems"),
                }
            }
            Some(_) => invalid.push("maxItems"),
        }

        match fields.get("compress") {
            None | Some(Value::Null) => {}
            Some(Value::Bool(flag)) => opts = opts.compress(*flag),
            Some(_) => invalid.push("compress"),
        }

        match fields.get("sweepIntervalMs") {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) => match positive_integer(n) {
                Some(ms) => opts = opts.sweep_interval(Duration::from_millis(ms)),
                None => invalid.push("sweepIntervalMs"),
            },
            Some(_) => invalid.push("sweepIntervalMs"),
        }

        if !invalid.is_empty() {
            return Err(CacheError::InvalidConfiguration(
                invalid.into_iter().map(String::from).collect(),
            ));
        }

        opts.validate()
    }
}

// == Cache Options ==
/// Typed builder for cache options. Unset fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    database: Option<String>,
    default_ttl: Option<Duration>,
    max_items: Option<usize>,
    compress: Option<bool>,
    sweep_interval: Option<Duration>,
}

impl CacheOptions {
    /// Creates an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Database location; `":memory:"` keeps everything in memory.
    pub fn database(mut self, location: impl Into<String>) -> Self {
        self.database = Some(location.into());
        self
    }

    /// TTL for writes that do not specify one.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Maximum number of entries kept after a sweep.
    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    /// Whether writes request compression by default.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }

    /// Interval between background sweeps.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Loads options from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DATABASE` - Database location (default: in-memory)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: none)
    /// - `CACHE_MAX_ITEMS` - Capacity bound (default: unbounded)
    /// - `CACHE_COMPRESS` - `true`/`false` (default: false)
    /// - `CACHE_SWEEP_INTERVAL_MS` - Sweep cadence (default: 500)
    ///
    /// # Errors
    /// `InvalidConfiguration` naming every variable that fails to parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut invalid = Vec::new();
        let mut opts = Self::new();

        if let Some(location) = lookup("CACHE_DATABASE") {
            opts.database = Some(location);
        }
        if let Some(raw) = lookup("CACHE_DEFAULT_TTL_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => opts.default_ttl = Some(Duration::from_millis(ms)),
                Err(_) => invalid.push("CACHE_DEFAULT_TTL_MS"),
            }
        }
        if let Some(raw) = lookup("CACHE_MAX_ITEMS") {
            match raw.trim().parse::<usize>() {
                Ok(max) => opts.max_items = Some(max),
                Err(_) => invalid.push("CACHE_MAX_ITEMS"),
            }
        }
        if let Some(raw) = lookup("CACHE_COMPRESS") {
            match raw.trim().parse::<bool>() {
                Ok(flag) => opts.compress = Some(flag),
                Err(_) => invalid.push("CACHE_COMPRESS"),
            }
        }
        if let Some(raw) = lookup("CACHE_SWEEP_INTERVAL_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => opts.sweep_interval = Some(Duration::from_millis(ms)),
                Err(_) => invalid.push("CACHE_SWEEP_INTERVAL_MS"),
            }
        }

        if invalid.is_empty() {
            Ok(opts)
        } else {
            Err(CacheError::InvalidConfiguration(
                invalid.into_iter().map(String::from).collect(),
            ))
        }
    }

    /// Produces the effective configuration.
    ///
    /// # Errors
    /// `InvalidConfiguration` when `max_items` or `sweep_interval` is zero.
    pub fn validate(self) -> Result<Config> {
        let defaults = Config::default();
        let mut invalid = Vec::new();

        let max_items = match self.max_items {
            None => None,
            Some(max) => match NonZeroUsize::new(max) {
                Some(max) => Some(max),
                None => {
                    invalid.push("maxItems".to_string());
                    None
                }
            },
        };

        let sweep_interval = self.sweep_interval.unwrap_or(defaults.sweep_interval);
        if sweep_interval.is_zero() {
            invalid.push("sweepIntervalMs".to_string());
        }

        if !invalid.is_empty() {
            return Err(CacheError::InvalidConfiguration(invalid));
        }

        Ok(Config {
            database: self
                .database
                .as_deref()
                .map(Database::parse)
                .unwrap_or_default(),
            default_ttl: self.default_ttl,
            max_items,
            compress: self.compress.unwrap_or(defaults.compress),
            sweep_interval,
        })
    }
}

// == Number Helpers ==
/// Non-negative millisecond count. Values past `Duration::MAX` saturate.
fn millis(n: &Number) -> Option<Duration> {
    if let Some(ms) = n.as_u64() {
        return Some(Duration::from_millis(ms));
    }
    n.as_f64()
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(|ms| Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX))
}

/// Strictly positive integral value, accepting `5.0` as well as `5`.
fn positive_integer(n: &Number) -> Option<u64> {
    if let Some(v) = n.as_u64() {
        return (v > 0).then_some(v);
    }
    n.as_f64()
        .filter(|v| v.is_finite() && *v >= 1.0 && v.fract() == 0.0 && *v <= u64::MAX as f64)
        .map(|v| v as u64)
}
