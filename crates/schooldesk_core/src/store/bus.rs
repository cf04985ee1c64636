//! Publish/subscribe fan-out of committed collection snapshots.
//!
//! # Responsibility
//! - Register callbacks per collection name and deliver snapshots to them.
//! - Isolate panicking callbacks from the rest of the fan-out.
//!
//! # Invariants
//! - Callbacks run in registration order.
//! - Callbacks run without any bus lock held, so they may subscribe,
//!   unsubscribe or mutate the store.
//! - Once a `Subscription` is dropped, later publishes never invoke it.

use crate::store::collection::Snapshot;
use log::error;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Snapshot callback registered for one collection.
pub type SnapshotCallback = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// A notified callback panicked while handling a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberError {
    pub collection: String,
    pub subscriber_id: u64,
    pub message: String,
}

impl Display for SubscriberError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "subscriber {} of `{}` failed: {}",
            self.subscriber_id, self.collection, self.message
        )
    }
}

impl Error for SubscriberError {}

struct Subscriber {
    collection: String,
    callback: SnapshotCallback,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    subscribers: BTreeMap<u64, Subscriber>,
}

/// Collection-keyed subscriber registry.
#[derive(Clone, Default)]
pub struct SubscriptionBus {
    state: Arc<Mutex<BusState>>,
}

impl SubscriptionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for snapshots of `collection`.
    pub fn subscribe(
        &self,
        collection: &str,
        callback: impl Fn(&Snapshot) + Send + Sync + 'static,
    ) -> Subscription {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        state.subscribers.insert(
            id,
            Subscriber {
                collection: collection.to_string(),
                callback: Arc::new(callback),
            },
        );
        Subscription {
            id,
            collection: collection.to_string(),
            bus: Arc::downgrade(&self.state),
        }
    }

    /// Delivers `snapshot` to every subscriber of its collection.
    ///
    /// Returns one error per callback that panicked; delivery continues past it.
    pub fn publish(&self, snapshot: &Snapshot) -> Vec<SubscriberError> {
        let targets: Vec<(u64, SnapshotCallback)> = {
            let state = lock(&self.state);
            state
                .subscribers
                .iter()
                .filter(|(_, subscriber)| subscriber.collection == snapshot.name())
                .map(|(id, subscriber)| (*id, Arc::clone(&subscriber.callback)))
                .collect()
        };

        let mut failures = Vec::new();
        for (id, callback) in targets {
            // Skip callbacks unsubscribed by an earlier callback in this round.
            if !lock(&self.state).subscribers.contains_key(&id) {
                continue;
            }
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(snapshot))) {
                let failure = SubscriberError {
                    collection: snapshot.name().to_string(),
                    subscriber_id: id,
                    message: panic_message(payload.as_ref()),
                };
                error!(
                    "event=subscriber_notify module=store status=error collection={} subscriber_id={} version={} error={}",
                    failure.collection,
                    id,
                    snapshot.version(),
                    failure.message
                );
                failures.push(failure);
            }
        }
        failures
    }

    /// Number of live subscribers for `collection`.
    pub fn subscriber_count(&self, collection: &str) -> usize {
        lock(&self.state)
            .subscribers
            .values()
            .filter(|subscriber| subscriber.collection == collection)
            .count()
    }
}

/// RAII handle for one registered callback; unsubscribes on drop.
pub struct Subscription {
    id: u64,
    collection: String,
    bus: Weak<Mutex<BusState>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Explicit unsubscribe; equivalent to dropping the handle.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(state) = self.bus.upgrade() {
            lock(&state).subscribers.remove(&self.id);
        }
    }
}

fn lock(state: &Mutex<BusState>) -> MutexGuard<'_, BusState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
