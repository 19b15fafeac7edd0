//! Cache Statistics Module
//!
//! Snapshot of cache performance counters.

use std::fmt;

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time view of a cache's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests served from a fresh entry
    pub hits: u64,
    /// Requests resolved by a computation (started or joined)
    pub misses: u64,
    /// Current number of entries in the cache
    pub size: usize,
    /// Capacity bound
    pub max_size: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={}, misses={}, maxsize={}, currsize={}",
            self.hits, self.misses, self.max_size, self.size
        )
    }
}

/// Mutable hit/miss counters owned by the engine.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub hits: u64,
    pub misses: u64,
}

impl Counters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
