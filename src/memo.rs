//! Memoization Adapters
//!
//! Binds a cache to a computation's arguments: [`Memoized`] derives keys
//! from call arguments, [`MemoizedFn`] additionally owns the computation.
//!
//! Per-receiver caching is expressed by ownership: a type that memoizes one
//! of its methods keeps a [`Memoized`] field, so each instance gets its own
//! entries, flights and counters, and clearing one never touches another.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::cache::{AsyncLruCache, CacheStats};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Maps call arguments to a cache key.
pub type KeyFn<A, K> = Arc<dyn Fn(&A) -> anyhow::Result<K> + Send + Sync>;

// == Memoized ==
/// A cache addressed by call arguments.
pub struct Memoized<A, K, V> {
    cache: AsyncLruCache<K, V>,
    key_fn: KeyFn<A, K>,
}

impl<A, V> Memoized<A, A, V>
where
    A: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Memoizes on the full argument value.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_key_fn(config, |args: &A| Ok(args.clone()))
    }
}

impl<A, K, V> Memoized<A, K, V>
where
    A: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Memoizes on the key `key_fn` derives from the arguments.
    ///
    /// Arguments that map to the same key share one cache slot.
    pub fn with_key_fn<F>(config: CacheConfig, key_fn: F) -> Result<Self>
    where
        F: Fn(&A) -> anyhow::Result<K> + Send + Sync + 'static,
    {
        Ok(Self {
            cache: AsyncLruCache::new(config)?,
            key_fn: Arc::new(key_fn),
        })
    }

    /// Returns an independent cache with the same configuration and key
    /// derivation, for a new receiver.
    pub fn fresh(&self) -> Result<Self> {
        Ok(Self {
            cache: AsyncLruCache::new(self.cache.config().clone())?,
            key_fn: Arc::clone(&self.key_fn),
        })
    }

    /// Derives the key for `args`.
    pub fn key_for(&self, args: &A) -> Result<K> {
        (self.key_fn)(args).map_err(CacheError::key_derivation)
    }

    /// Returns the memoized result of `compute(args)`.
    ///
    /// A key derivation failure is returned immediately; no computation is
    /// started or joined.
    pub async fn call<F, Fut, E>(&self, args: A, compute: F) -> Result<V>
    where
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let key = self.key_for(&args)?;
        self.cache.get_or_compute(key, move || compute(args)).await
    }

    pub fn cache(&self) -> &AsyncLruCache<K, V> {
        &self.cache
    }

    pub fn cache_clear(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache_info(&self) -> String {
        self.cache.cache_info()
    }
}

impl<A, K, V> fmt::Debug for Memoized<A, K, V>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized").field("cache", &self.cache).finish()
    }
}

type BoundFn<A, V> = Arc<dyn Fn(A) -> BoxFuture<'static, anyhow::Result<V>> + Send + Sync>;

// == Memoized Fn ==
/// An async function wrapped with its own cache.
pub struct MemoizedFn<A, K, V> {
    memo: Memoized<A, K, V>,
    func: BoundFn<A, V>,
}

impl<A, K, V> MemoizedFn<A, K, V>
where
    A: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Wraps `func` so repeated calls with the same key reuse its result.
    pub fn new<F, Fut, E>(memo: Memoized<A, K, V>, func: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let func: BoundFn<A, V> = Arc::new(move |args: A| {
            func(args)
                .map(|result| -> anyhow::Result<V> { result.map_err(Into::into) })
                .boxed()
        });
        Self { memo, func }
    }

    pub async fn call(&self, args: A) -> Result<V> {
        let func = Arc::clone(&self.func);
        self.memo.call(args, move |args| func(args)).await
    }

    pub fn memo(&self) -> &Memoized<A, K, V> {
        &self.memo
    }

    pub fn cache_clear(&self) {
        self.memo.cache_clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.memo.cache_stats()
    }

    pub fn cache_info(&self) -> String {
        self.memo.cache_info()
    }
}
