//! Access Order Index
//!
//! Recency ordering for the in-memory store's capacity eviction. Each access
//! stamps the key with a fresh sequence number; the smallest live stamp is the
//! least recently used key. Touch, remove and eviction are all O(log n).

use std::collections::{BTreeMap, HashMap};

// == LRU Tracker ==
/// Keys ordered by their last access.
#[derive(Debug, Default)]
pub struct LruTracker {
    /// Access stamp -> key, oldest first
    by_stamp: BTreeMap<u64, String>,
    /// Key -> its current stamp
    stamps: HashMap<String, u64>,
    next_stamp: u64,
}

impl LruTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as the most recently accessed, adding it if unknown.
    pub fn touch(&mut self, key: &str) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;

        match self.stamps.get_mut(key) {
            Some(current) => {
                self.by_stamp.remove(&*current);
                *current = stamp;
            }
            None => {
                self.stamps.insert(key.to_string(), stamp);
            }
        }
        self.by_stamp.insert(stamp, key.to_string());
    }

    /// Stops tracking `key`. Unknown keys are ignored.
    pub fn remove(&mut self, key: &str) {
        if let Some(stamp) = self.stamps.remove(key) {
            self.by_stamp.remove(&stamp);
        }
    }

    /// Removes and returns the least recently accessed key.
    pub fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.by_stamp.pop_first()?;
        self.stamps.remove(&key);
        Some(key)
    }

    pub fn clear(&mut self) {
        self.by_stamp.clear();
        self.stamps.clear();
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}
