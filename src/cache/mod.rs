//! Cache Module
//!
//! Async memoization cache with TTL expiration, LRU eviction and
//! single-flight deduplication of concurrent computations.

pub mod clock;
mod engine;
mod entry;
pub mod flight;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use engine::AsyncLruCache;
pub use entry::CacheEntry;
pub use flight::{Flight, FlightPublisher, FlightTicket, FlightTracker};
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::EntryStore;
