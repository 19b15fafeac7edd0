//! Flight Cache - bounded async memoization with TTL and LRU eviction
//!
//! Caches the results of expensive async computations. Concurrent requests
//! for the same missing key share a single computation.

pub mod cache;
pub mod config;
pub mod error;
pub mod memo;
pub mod models;

pub use cache::{AsyncLruCache, CacheStats};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use memo::{Memoized, MemoizedFn};
