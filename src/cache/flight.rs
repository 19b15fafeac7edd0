//! Flight Tracker Module
//!
//! Registry of in-progress computations, one per key. The first caller to
//! miss on a key becomes the starter and owns the publisher; everyone else
//! joins the same ticket and waits for the published outcome.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};

use crate::error::CacheError;

/// Value or failure delivered to every waiter of a flight.
pub type Outcome<V> = std::result::Result<V, CacheError>;

type OutcomeChannel<V> = Shared<oneshot::Receiver<Outcome<V>>>;

// == Flight Ticket ==
/// Shared handle on the outcome of one in-progress computation.
pub struct FlightTicket<V> {
    id: u64,
    channel: OutcomeChannel<V>,
}

impl<V: Clone> Clone for FlightTicket<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            channel: self.channel.clone(),
        }
    }
}

impl<V> fmt::Debug for FlightTicket<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightTicket").field("id", &self.id).finish()
    }
}

impl<V: Clone> FlightTicket<V> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Suspends until the flight publishes, then returns its outcome.
    ///
    /// Dropping this future only detaches this waiter; the computation and
    /// other waiters are unaffected.
    pub async fn await_outcome(self) -> Outcome<V> {
        match self.channel.await {
            Ok(outcome) => outcome,
            Err(oneshot::Canceled) => Err(CacheError::Abandoned(format!(
                "flight {} ended without an outcome",
                self.id
            ))),
        }
    }
}

// == Flight Publisher ==
/// Exclusive right to publish a flight's outcome. Held by the starter only.
pub struct FlightPublisher<V> {
    id: u64,
    sender: oneshot::Sender<Outcome<V>>,
}

impl<V> fmt::Debug for FlightPublisher<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightPublisher").field("id", &self.id).finish()
    }
}

impl<V> FlightPublisher<V> {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Result of [`FlightTracker::join_or_start`].
#[derive(Debug)]
pub enum Flight<V> {
    /// No flight was registered: the caller must compute and publish.
    Starter {
        ticket: FlightTicket<V>,
        publisher: FlightPublisher<V>,
    },
    /// A flight is already running: the caller must only wait.
    Joiner(FlightTicket<V>),
}

impl<V> Flight<V> {
    pub fn is_starter(&self) -> bool {
        matches!(self, Flight::Starter { .. })
    }
}

// == Flight Tracker ==
/// Per-key registry of pending outcomes.
///
/// Not synchronized on its own; the owning cache serializes access.
pub struct FlightTracker<K, V> {
    pending: HashMap<K, FlightTicket<V>>,
    next_id: u64,
}

impl<K, V> fmt::Debug for FlightTracker<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightTracker")
            .field("pending", &self.pending.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> FlightTracker<K, V> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 0,
        }
    }

    // == Join Or Start ==
    /// Joins the flight registered for `key`, or registers a new one.
    pub fn join_or_start(&mut self, key: &K) -> Flight<V> {
        if let Some(ticket) = self.pending.get(key) {
            return Flight::Joiner(ticket.clone());
        }

        let id = self.next_id;
        self.next_id += 1;

        let (sender, receiver) = oneshot::channel();
        let ticket = FlightTicket {
            id,
            channel: receiver.shared(),
        };
        self.pending.insert(key.clone(), ticket.clone());

        Flight::Starter {
            ticket,
            publisher: FlightPublisher { id, sender },
        }
    }

    // == Publish ==
    /// Delivers `outcome` to every waiter of the publisher's flight and
    /// unregisters it, so the next miss on `key` starts afresh.
    ///
    /// Returns false if the registry no longer pointed at this flight.
    pub fn publish(
        &mut self,
        key: &K,
        publisher: FlightPublisher<V>,
        outcome: Outcome<V>,
    ) -> bool {
        let registered = self.pending.get(key).map(FlightTicket::id) == Some(publisher.id);
        if registered {
            self.pending.remove(key);
        }
        // Nobody left waiting is fine.
        let _ = publisher.sender.send(outcome);
        registered
    }

    // == Abandon ==
    /// Publishes `Abandoned` for a flight that will never produce an outcome,
    /// freeing `key` for a fresh computation.
    pub fn abandon(&mut self, key: &K, publisher: FlightPublisher<V>) -> bool {
        let reason = format!("flight {} was dropped before completing", publisher.id);
        self.publish(key, publisher, Err(CacheError::Abandoned(reason)))
    }
}

impl<K: Eq + Hash, V> FlightTracker<K, V> {
    pub fn contains(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Number of keys with a computation in progress.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for FlightTracker<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
