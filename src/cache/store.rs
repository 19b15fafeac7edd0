//! Entry Store Module
//!
//! Bounded key-to-entry map combining HashMap storage with LRU tracking.
//! Expiry is stamped here but judged by the caller.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use crate::cache::{CacheEntry, LruTracker};
use crate::error::{CacheError, Result};

// == Entry Store ==
/// Recency-ordered storage with a hard capacity bound.
#[derive(Debug)]
pub struct EntryStore<K, V> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker<K>,
    /// Maximum number of entries allowed
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V> EntryStore<K, V> {
    // == Constructor ==
    /// Creates an empty store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "max_size must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            capacity,
        })
    }

    // == Lookup ==
    /// Returns the entry for `key` without changing recency order.
    pub fn lookup(&self, key: &K) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    // == Touch And Get ==
    /// Returns the entry for `key`, promoting it to most recently used.
    ///
    /// Expired entries are returned as well; the caller decides.
    pub fn touch_and_get(&mut self, key: &K) -> Option<&CacheEntry<V>> {
        let entry = self.entries.get(key)?;
        self.lru.touch(key);
        Some(entry)
    }

    // == Insert ==
    /// Stores `value` under `key` with the given lifetime.
    ///
    /// An existing entry is overwritten and promoted. A new entry that pushes
    /// the store past capacity evicts the least recently used key, which is
    /// returned.
    pub fn insert(&mut self, key: K, value: V, ttl: Option<Duration>) -> Option<K> {
        let entry = CacheEntry::new(value, ttl);
        self.lru.touch(&key);
        if self.entries.insert(key, entry).is_some() {
            return None;
        }

        if self.entries.len() > self.capacity {
            let evicted = self.lru.evict_oldest()?;
            self.entries.remove(&evicted);
            return Some(evicted);
        }
        None
    }

    // == Remove ==
    /// Removes an entry by key. No-op if absent.
    pub fn remove(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        Some(entry)
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
    }

    // == Length ==
    /// Returns the current number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub(crate) fn keys_by_recency(&self) -> Vec<K> {
        self.lru.keys_by_recency()
    }
}
