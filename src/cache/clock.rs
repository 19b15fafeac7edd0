//! Clock Module
//!
//! Monotonic timestamps for TTL computation.
//!
//! Backed by `tokio::time::Instant`, which follows the paused test clock
//! (`tokio::time::pause` / `advance`) and the real monotonic clock otherwise.

use std::time::Duration;

use tokio::time::Instant;

/// Returns the current instant.
pub fn now() -> Instant {
    Instant::now()
}

/// Returns the expiry instant for an entry created at `from`, or None if
/// the entry never expires.
///
/// A TTL too large to represent as an instant never expires.
pub fn deadline(from: Instant, ttl: Option<Duration>) -> Option<Instant> {
    ttl.filter(|ttl| !ttl.is_zero()).and_then(|ttl| from.checked_add(ttl))
}
