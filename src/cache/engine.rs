//! Cache Engine Module
//!
//! Ties the entry store and the flight tracker together behind one lock to
//! provide `get_or_compute` with LRU eviction, lazy TTL expiry and
//! single-flight deduplication.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::flight::{Flight, FlightPublisher, FlightTicket, FlightTracker, Outcome};
use crate::cache::stats::Counters;
use crate::cache::{clock, CacheStats, EntryStore};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Bookkeeping guarded by the engine lock.
struct State<K, V> {
    store: EntryStore<K, V>,
    flights: FlightTracker<K, V>,
    counters: Counters,
    /// Bumped by `clear`; flights started in an older generation are not admitted.
    generation: u64,
}

struct Shared<K, V> {
    config: CacheConfig,
    state: Mutex<State<K, V>>,
}

/// Owns a started flight until its outcome is published.
///
/// Dropped unpublished (synchronous panic, runtime shutdown), it abandons the
/// flight so the key is free for the next request.
struct FlightGuard<K: Eq + Hash + Clone, V: Clone> {
    shared: Arc<Shared<K, V>>,
    key: K,
    generation: u64,
    publisher: Option<FlightPublisher<V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> FlightGuard<K, V> {
    fn complete(mut self, outcome: Outcome<V>) {
        if let Some(publisher) = self.publisher.take() {
            self.shared.complete(&self.key, publisher, self.generation, outcome);
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Drop for FlightGuard<K, V> {
    fn drop(&mut self) {
        if let Some(publisher) = self.publisher.take() {
            warn!(flight = publisher.id(), "Computation dropped before completing");
            self.shared.state.lock().flights.abandon(&self.key, publisher);
        }
    }
}

fn panicked() -> CacheError {
    CacheError::computation(anyhow::anyhow!("computation panicked"))
}

enum Lookup<V> {
    Hit(V),
    Miss {
        ticket: FlightTicket<V>,
        publisher: Option<FlightPublisher<V>>,
        generation: u64,
    },
}

// == Async LRU Cache ==
/// Bounded, expiring cache for the results of async computations.
///
/// Concurrent requests for the same absent key share one computation.
/// Clones share the same underlying cache.
///
/// # Example
/// ```no_run
/// # async fn run() -> flight_cache::Result<()> {
/// use flight_cache::{AsyncLruCache, CacheConfig};
///
/// let cache = AsyncLruCache::new(CacheConfig::new(10).with_ttl_secs(60.0)?)?;
/// let value = cache
///     .get_or_compute("answer", || async { Ok::<_, std::io::Error>(42) })
///     .await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub struct AsyncLruCache<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for AsyncLruCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> AsyncLruCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache from validated configuration.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let store = EntryStore::new(config.max_size)?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State {
                    store,
                    flights: FlightTracker::new(),
                    counters: Counters::default(),
                    generation: 0,
                }),
            }),
        })
    }

    // == Get Or Compute ==
    /// Returns the cached value for `key`, or runs `compute` to produce it.
    ///
    /// Only the first caller to miss on `key` invokes `compute`; concurrent
    /// callers wait for that same computation and receive the same value or
    /// the same failure. Failures are never cached.
    ///
    /// The computation runs as a Tokio task, so this must be called from
    /// within a Tokio runtime. Dropping the returned future detaches the
    /// caller without cancelling the computation.
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let (ticket, generation) = match self.lookup_or_join(&key) {
            Lookup::Hit(value) => return Ok(value),
            Lookup::Miss {
                ticket,
                publisher,
                generation,
            } => {
                if let Some(publisher) = publisher {
                    let flight = FlightGuard {
                        shared: Arc::clone(&self.shared),
                        key,
                        generation,
                        publisher: Some(publisher),
                    };
                    match panic::catch_unwind(AssertUnwindSafe(compute)) {
                        Ok(computation) => Self::spawn_flight(flight, computation),
                        Err(_) => flight.complete(Err(panicked())),
                    }
                }
                (ticket, generation)
            }
        };

        let outcome = ticket.await_outcome().await;
        if outcome.is_ok() {
            self.record_miss(generation);
        }
        outcome
    }

    /// Fast path under the lock: fresh hit, or register with a flight.
    fn lookup_or_join(&self, key: &K) -> Lookup<V> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let now = clock::now();

        if let Some(entry) = state.store.touch_and_get(key) {
            if !entry.is_expired_at(now) {
                let value = entry.value.clone();
                state.counters.record_hit();
                return Lookup::Hit(value);
            }
            state.store.remove(key);
            debug!("Removed expired entry on access");
        }

        let generation = state.generation;
        match state.flights.join_or_start(key) {
            Flight::Starter { ticket, publisher } => {
                debug!(flight = ticket.id(), "Cache miss, starting computation");
                Lookup::Miss {
                    ticket,
                    publisher: Some(publisher),
                    generation,
                }
            }
            Flight::Joiner(ticket) => {
                debug!(flight = ticket.id(), "Cache miss, joining computation in progress");
                Lookup::Miss {
                    ticket,
                    publisher: None,
                    generation,
                }
            }
        }
    }

    /// Runs the computation outside the lock and publishes its outcome.
    fn spawn_flight<Fut, E>(flight: FlightGuard<K, V>, computation: Fut)
    where
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(computation).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(CacheError::computation(err)),
                Err(_) => Err(panicked()),
            };
            flight.complete(outcome);
        });
    }

    fn record_miss(&self, generation: u64) {
        let mut state = self.shared.state.lock();
        if state.generation == generation {
            state.counters.record_miss();
        }
    }

    // == Invalidate ==
    /// Drops the entry for `key`, if any. In-progress computations are untouched.
    pub fn invalidate(&self, key: &K) -> bool {
        self.shared.state.lock().store.remove(key).is_some()
    }

    // == Clear ==
    /// Empties the cache and resets hit/miss counters.
    ///
    /// Computations already in progress still deliver to their waiters, but
    /// their values are not admitted.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        state.store.clear();
        state.counters.reset();
        state.generation = state.generation.wrapping_add(1);
        info!(in_flight = state.flights.len(), "Cache cleared");
    }
}

impl<K, V> AsyncLruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    // == Stats ==
    /// Returns a snapshot of the counters without changing them.
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        CacheStats {
            hits: state.counters.hits,
            misses: state.counters.misses,
            size: state.store.len(),
            max_size: self.shared.config.max_size,
        }
    }

    /// Human readable summary, e.g. `hits=5, misses=3, maxsize=128, currsize=4`.
    pub fn cache_info(&self) -> String {
        self.stats().to_string()
    }

    /// Number of stored entries, including expired ones not yet accessed.
    pub fn len(&self) -> usize {
        self.shared.state.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with a computation in progress.
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().flights.len()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Publishes the outcome and admits a successful value, unless the
    /// cache was cleared meanwhile.
    ///
    /// The flight is unregistered before admission, so the key is free even
    /// if admission fails.
    fn complete(
        &self,
        key: &K,
        publisher: FlightPublisher<V>,
        generation: u64,
        outcome: Outcome<V>,
    ) {
        let flight = publisher.id();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let admitted = match &outcome {
            Ok(value) if state.generation == generation => Some(value.clone()),
            Ok(_) => {
                warn!(flight, "Cache cleared during computation, result not admitted");
                None
            }
            Err(err) => {
                warn!(flight, error = %err, "Computation failed");
                None
            }
        };

        state.flights.publish(key, publisher, outcome);

        if let Some(value) = admitted {
            if state.store.insert(key.clone(), value, self.config.ttl).is_some() {
                debug!(flight, "Evicted least recently used entry");
            }
        }
    }
}

impl<K, V> fmt::Debug for AsyncLruCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncLruCache")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::advance;

    type TestCache = AsyncLruCache<String, u64>;

    fn cache(max_size: usize, ttl: Option<Duration>) -> TestCache {
        let mut config = CacheConfig::new(max_size);
        if let Some(ttl) = ttl {
            config = config.with_ttl(ttl);
        }
        AsyncLruCache::new(config).unwrap()
    }

    async fn fetch(cache: &TestCache, key: &str, value: u64, calls: &Arc<AtomicUsize>) -> u64 {
        let calls = Arc::clone(calls);
        cache
            .get_or_compute(key.to_string(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(value)
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = AsyncLruCache::<u8, u8>::new(CacheConfig::new(0));
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = cache(4, None);
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(fetch(&cache, "a", 1, &calls).await, 1);
        assert_eq!(fetch(&cache, "a", 2, &calls).await, 1);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_eviction_scenario() {
        let cache = cache(2, Some(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        fetch(&cache, "A", 1, &calls).await;
        fetch(&cache, "B", 2, &calls).await;
        fetch(&cache, "A", 1, &calls).await;
        fetch(&cache, "C", 3, &calls).await;

        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 3,
                size: 2,
                max_size: 2
            }
        );
        assert_eq!(
            cache.shared.state.lock().store.keys_by_recency(),
            vec!["C".to_string(), "A".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_recomputed() {
        let cache = cache(4, Some(Duration::from_secs(10)));
        let calls = Arc::new(AtomicUsize::new(0));

        fetch(&cache, "k", 1, &calls).await;
        advance(Duration::from_secs(9)).await;
        assert_eq!(fetch(&cache, "k", 2, &calls).await, 1);

        advance(Duration::from_secs(1)).await;
        assert_eq!(fetch(&cache, "k", 2, &calls).await, 2);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_not_cached() {
        let cache = cache(4, None);

        let err = cache
            .get_or_compute("k".to_string(), || async { Err::<u64, _>(anyhow::anyhow!("down")) })
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Computation(_)));
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight(), 0);

        let value = cache
            .get_or_compute("k".to_string(), || async { Ok::<_, anyhow::Error>(5) })
            .await
            .unwrap();
        assert_eq!(value, 5);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_panic_published_as_failure() {
        let cache = cache(4, None);

        let err = cache
            .get_or_compute("k".to_string(), || async {
                if true {
                    panic!("computation blew up");
                }
                Ok::<u64, anyhow::Error>(1)
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Computation failed: computation panicked");
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panic_while_building_future_frees_key() {
        let cache = cache(4, None);

        let err = cache
            .get_or_compute("k".to_string(), || -> std::future::Ready<anyhow::Result<u64>> {
                panic!("no future for you")
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Computation failed: computation panicked");
        assert_eq!(cache.in_flight(), 0);

        let calls = Arc::new(AtomicUsize::new(0));
        assert_eq!(fetch(&cache, "k", 3, &calls).await, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_runtime_shutdown_frees_key() {
        let cache = cache(4, None);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let stuck = cache.clone();
            tokio::spawn(async move {
                stuck
                    .get_or_compute("k".to_string(), std::future::pending::<anyhow::Result<u64>>)
                    .await
            });
            while cache.in_flight() == 0 {
                tokio::task::yield_now().await;
            }
        });
        assert_eq!(cache.in_flight(), 1);

        // Shutting down drops the computation task without running it to completion.
        drop(runtime);
        assert_eq!(cache.in_flight(), 0);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        assert_eq!(runtime.block_on(fetch(&cache, "k", 8, &calls)), 8);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_never_expires() {
        let cache = cache(4, Some(Duration::from_secs(u64::MAX)));
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(fetch(&cache, "k", 1, &calls).await, 1);
        assert_eq!(cache.len(), 1);
        advance(Duration::from_secs(10 * 365 * 24 * 3600)).await;
        assert_eq!(fetch(&cache, "k", 2, &calls).await, 1);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let state = cache.shared.state.lock();
        let entry = state.store.lookup(&"k".to_string()).unwrap();
        assert_eq!(entry.expires_at, None);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = cache(4, None);
        let calls = Arc::new(AtomicUsize::new(0));

        fetch(&cache, "k", 1, &calls).await;
        assert!(cache.invalidate(&"k".to_string()));
        assert!(!cache.invalidate(&"k".to_string()));

        fetch(&cache, "k", 1, &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let cache = cache(4, None);
        let calls = Arc::new(AtomicUsize::new(0));

        fetch(&cache, "a", 1, &calls).await;
        fetch(&cache, "a", 1, &calls).await;
        cache.clear();

        assert_eq!(cache.stats(), CacheStats { max_size: 4, ..Default::default() });
        fetch(&cache, "a", 1, &calls).await;
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.cache_info(), "hits=0, misses=1, maxsize=4, currsize=1");
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let cache = cache(4, None);
        let other = cache.clone();
        let calls = Arc::new(AtomicUsize::new(0));

        fetch(&cache, "a", 1, &calls).await;
        fetch(&other, "a", 1, &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(other.stats().hits, 1);
    }
}
