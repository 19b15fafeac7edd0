//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use tokio::time::Instant;

use crate::cache::clock;

// == Cache Entry ==
/// Represents a single admitted value with its expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Admission instant
    pub created_at: Instant,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry admitted now with optional TTL.
    pub fn new(value: V, ttl: Option<Duration>) -> Self {
        let now = clock::now();
        Self {
            value,
            created_at: now,
            expires_at: clock::deadline(now, ttl),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once `now >= expires_at`, so an entry admitted
    /// with TTL `t` is a miss for any access at or after `t` has elapsed.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Checks if the entry has expired against the current clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(clock::now())
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or None if no expiration is set.
    ///
    /// Returns `Some(Duration::ZERO)` once the entry has expired.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(clock::now()))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new("test_value", None);

        assert_eq!(entry.value, "test_value");
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
        assert!(entry.ttl_remaining().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expiration() {
        let entry = CacheEntry::new(7u32, Some(Duration::from_secs(1)));
        assert!(!entry.is_expired());

        advance(Duration::from_millis(999)).await;
        assert!(!entry.is_expired());

        advance(Duration::from_millis(1)).await;
        assert!(entry.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_remaining() {
        let entry = CacheEntry::new((), Some(Duration::from_secs(10)));
        assert_eq!(entry.ttl_remaining(), Some(Duration::from_secs(10)));

        advance(Duration::from_secs(4)).await;
        assert_eq!(entry.ttl_remaining(), Some(Duration::from_secs(6)));

        advance(Duration::from_secs(30)).await;
        assert_eq!(entry.ttl_remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = clock::now();
        let entry = CacheEntry {
            value: "test",
            created_at: now,
            expires_at: Some(now),
        };

        assert!(entry.is_expired_at(now), "Entry should be expired at boundary");
    }
}
