//! Expiration Sweeper
//!
//! Background task that removes expired entries and trims the store to its
//! capacity bound.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::{Lifecycle, StatsRecorder};
use crate::error::{CacheError, Result};
use crate::store::{current_timestamp_ms, Store, StoreResult};

// == Sweep Report ==
/// Removals made by one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries whose TTL had elapsed
    pub expired: usize,
    /// Entries beyond the capacity bound
    pub evicted: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired == 0 && self.evicted == 0
    }
}

/// One sweep against the store: expire first, then enforce capacity.
pub fn sweep_store(
    store: &dyn Store,
    max_items: Option<NonZeroUsize>,
    now: i64,
) -> StoreResult<SweepReport> {
    let expired = store.delete_expired(now)?;
    let evicted = match max_items {
        Some(max) => store.delete_excess_by_recency(max.get())?,
        None => 0,
    };
    Ok(SweepReport { expired, evicted })
}

// == Sweep Target ==
/// Everything a sweep needs, shared with the owning cache.
#[derive(Clone)]
pub(crate) struct SweepTarget {
    pub store: Arc<dyn Store>,
    pub lifecycle: Arc<Lifecycle>,
    pub stats: Arc<StatsRecorder>,
    pub max_items: Option<NonZeroUsize>,
}

impl SweepTarget {
    /// Runs one pass on the blocking pool.
    ///
    /// Fails with `Closed` without touching the store once the cache is closed.
    pub async fn run(&self) -> Result<SweepReport> {
        self.lifecycle.ensure_open()?;

        let store = Arc::clone(&self.store);
        let max_items = self.max_items;
        let report = tokio::task::spawn_blocking(move || {
            sweep_store(store.as_ref(), max_items, current_timestamp_ms())
        })
        .await
        .map_err(|e| CacheError::Runtime(e.to_string()))??;

        self.stats.record_sweep(report.expired, report.evicted);
        Ok(report)
    }
}

// == Sweeper ==
/// Handle to the recurring sweep task. Aborts the task when dropped.
#[derive(Debug)]
pub struct Sweeper {
    handle: JoinHandle<()>,
    trigger: Arc<Notify>,
}

impl Sweeper {
    /// Spawns the sweep loop on `runtime`.
    ///
    /// The loop wakes every `interval` and whenever [`Sweeper::trigger`] is
    /// called. Triggers coalesce into a single pending permit, and passes run
    /// one after another, so the backlog never exceeds one sweep.
    pub(crate) fn spawn(runtime: &Handle, target: SweepTarget, interval: Duration) -> Self {
        // tokio intervals panic on a zero period
        let interval = interval.max(Duration::from_millis(1));
        let trigger = Arc::new(Notify::new());
        let wakeups = Arc::clone(&trigger);

        let handle = runtime.spawn(async move {
            info!("Starting sweeper with interval of {:?}", interval);

            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = wakeups.notified() => {}
                }

                match target.run().await {
                    Ok(report) if report.is_empty() => {
                        debug!("Sweep: nothing to remove");
                    }
                    Ok(report) => {
                        debug!(
                            "Sweep: removed {} expired and {} excess entries",
                            report.expired, report.evicted
                        );
                    }
                    Err(CacheError::Closed) => {
                        debug!("Sweep skipped: cache closed");
                        break;
                    }
                    Err(err) => {
                        warn!("Sweep failed, retrying next tick: {}", err);
                    }
                }
            }
        });

        Self { handle, trigger }
    }

    /// Requests a sweep without waiting for it.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Cancels the recurring schedule.
    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
