//! In-Memory Store
//!
//! HashMap storage with an access-order tracker. Used by tests as a stand-in
//! for SQLite and by callers that never need persistence.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{CacheEntry, LruTracker, Store, StoreError, StoreResult, StoredValue};

#[derive(Debug, Default)]
struct Entries {
    rows: HashMap<String, CacheEntry>,
    lru: LruTracker,
}

impl Entries {
    fn remove(&mut self, key: &str) -> bool {
        let removed = self.rows.remove(key).is_some();
        if removed {
            self.lru.remove(key);
        }
        removed
    }
}

// == Memory Store ==
/// Volatile [`Store`] guarded by a single mutex.
#[derive(Debug)]
pub struct MemoryStore {
    /// None once closed
    inner: Mutex<Option<Entries>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Some(Entries::default())),
        }
    }

    fn with_entries<R>(&self, op: impl FnOnce(&mut Entries) -> R) -> StoreResult<R> {
        let mut guard = self.inner.lock();
        let entries = guard.as_mut().ok_or(StoreError::Closed)?;
        Ok(op(entries))
    }
}

impl Store for MemoryStore {
    fn touch_and_fetch(&self, key: &str, now: i64) -> StoreResult<Option<StoredValue>> {
        self.with_entries(|entries| {
            let entry = entries.rows.get_mut(key).filter(|e| e.is_live_at(now))?;
            entry.touch(now);
            let value = entry.value.clone();
            entries.lru.touch(key);
            Some(value)
        })
    }

    fn upsert(
        &self,
        key: &str,
        value: StoredValue,
        expires_at: Option<i64>,
        now: i64,
    ) -> StoreResult<()> {
        self.with_entries(|entries| {
            entries
                .rows
                .insert(key.to_string(), CacheEntry::new(value, expires_at, now));
            entries.lru.touch(key);
        })
    }

    fn delete_key(&self, key: &str) -> StoreResult<()> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }

    fn delete_all(&self) -> StoreResult<()> {
        self.with_entries(|entries| {
            entries.rows.clear();
            entries.lru.clear();
        })
    }

    fn delete_expired(&self, now: i64) -> StoreResult<usize> {
        self.with_entries(|entries| {
            let expired: Vec<String> = entries
                .rows
                .iter()
                .filter(|(_, entry)| entry.is_expired_before(now))
                .map(|(key, _)| key.clone())
                .collect();

            for key in &expired {
                entries.remove(key);
            }
            expired.len()
        })
    }

    fn delete_excess_by_recency(&self, max_items: usize) -> StoreResult<usize> {
        self.with_entries(|entries| {
            let mut evicted = 0;
            while entries.lru.len() > max_items {
                match entries.lru.evict_oldest() {
                    Some(key) => {
                        entries.rows.remove(&key);
                        evicted += 1;
                    }
                    None => break,
                }
            }
            evicted
        })
    }

    fn len(&self) -> StoreResult<usize> {
        self.with_entries(|entries| entries.rows.len())
    }

    fn close(&self) -> StoreResult<()> {
        self.inner.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(s: &str) -> StoredValue {
        StoredValue::plain(s.as_bytes().to_vec())
    }

    #[test]
    fn test_upsert_and_fetch() {
        let store = MemoryStore::new();
        store.upsert("k", value("v"), None, 10).unwrap();

        assert_eq!(store.touch_and_fetch("k", 20).unwrap(), Some(value("v")));
        assert_eq!(store.touch_and_fetch("missing", 20).unwrap(), None);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_upsert_replaces_whole_entry() {
        let store = MemoryStore::new();
        store
            .upsert(
                "k",
                StoredValue {
                    bytes: vec![1, 2],
                    compressed: true,
                },
                Some(50),
                10,
            )
            .unwrap();
        store.upsert("k", value("new"), None, 20).unwrap();

        // The new entry has no expiry and is uncompressed
        assert_eq!(store.touch_and_fetch("k", 100).unwrap(), Some(value("new")));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_expired_entry_is_neither_returned_nor_touched() {
        let store = MemoryStore::new();
        store.upsert("k", value("v"), Some(100), 10).unwrap();

        assert_eq!(store.touch_and_fetch("k", 100).unwrap(), None);
        // Still present until swept
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.delete_expired(101).unwrap(), 1);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_delete_expired_keeps_live_and_unbounded() {
        let store = MemoryStore::new();
        store.upsert("old", value("1"), Some(50), 0).unwrap();
        store.upsert("fresh", value("2"), Some(500), 0).unwrap();
        store.upsert("forever", value("3"), None, 0).unwrap();

        assert_eq!(store.delete_expired(100).unwrap(), 1);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_delete_excess_keeps_most_recent() {
        let store = MemoryStore::new();
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            store.upsert(key, value(key), None, i as i64).unwrap();
        }
        store.touch_and_fetch("a", 10).unwrap();

        assert_eq!(store.delete_excess_by_recency(2).unwrap(), 2);
        assert!(store.touch_and_fetch("a", 11).unwrap().is_some());
        assert!(store.touch_and_fetch("d", 11).unwrap().is_some());
        assert!(store.touch_and_fetch("b", 11).unwrap().is_none());
        assert!(store.touch_and_fetch("c", 11).unwrap().is_none());
    }

    #[test]
    fn test_delete_key_and_all() {
        let store = MemoryStore::new();
        store.upsert("a", value("1"), None, 0).unwrap();
        store.upsert("b", value("2"), None, 0).unwrap();

        store.delete_key("a").unwrap();
        store.delete_key("a").unwrap();
        assert_eq!(store.len().unwrap(), 1);

        store.delete_all().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let store = MemoryStore::new();
        store.close().unwrap();
        store.close().unwrap();

        assert!(matches!(store.len(), Err(StoreError::Closed)));
        assert!(matches!(
            store.upsert("k", value("v"), None, 0),
            Err(StoreError::Closed)
        ));
    }
}
