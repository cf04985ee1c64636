//! Live stats aggregator over store collections.
//!
//! # Responsibility
//! - Recompute stat entries whenever a dependency collection publishes.
//! - Poll on a fixed interval so date-relative values roll over without
//!   any mutation.
//!
//! # Invariants
//! - Recomputations are serialized; a published result always reflects
//!   snapshots at least as new as the previous result.
//! - The polling thread is stopped and joined when the aggregator stops.

use crate::stats::{compute_stats, default_entries, StatContext, StatEntry, StatsSnapshot};
use crate::store::{Store, StoreResult, Subscription};
use log::{debug, error, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct AggregatorShared {
    store: Store,
    entries: Vec<StatEntry>,
    dependencies: Vec<&'static str>,
    current: Mutex<StatsSnapshot>,
}

impl AggregatorShared {
    fn recompute(&self) -> StatsSnapshot {
        let mut current = self.lock_current();

        let mut snapshots = BTreeMap::new();
        for name in &self.dependencies {
            match self.store.get_all(name) {
                Ok(snapshot) => {
                    snapshots.insert((*name).to_string(), snapshot);
                }
                Err(err) => warn!(
                    "event=stats_recompute module=stats status=partial collection={name} error_code={} error={}",
                    err.code(),
                    err
                ),
            }
        }

        let context = StatContext::new(&snapshots, self.store.clock().today());
        let next = compute_stats(&self.entries, &context);
        *current = next.clone();
        next
    }

    fn lock_current(&self) -> MutexGuard<'_, StatsSnapshot> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Poller {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    fn spawn(shared: Weak<AggregatorShared>, interval: Duration) -> Option<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let spawned = thread::Builder::new()
            .name("schooldesk-stats-poll".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => match shared.upgrade() {
                        Some(shared) => {
                            shared.recompute();
                        }
                        None => break,
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });

        match spawned {
            Ok(handle) => Some(Self {
                stop_tx,
                handle: Some(handle),
            }),
            Err(err) => {
                error!(
                    "event=stats_poll_start module=stats status=error error_code=thread_spawn_failed error={err}"
                );
                None
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("event=stats_poll_stop module=stats status=error error_code=poll_thread_panicked");
            }
        }
    }
}

/// Keeps dashboard statistics in sync with store collections.
///
/// Dropping the aggregator unsubscribes it and stops its polling thread.
pub struct StatsAggregator {
    shared: Arc<AggregatorShared>,
    subscriptions: Vec<Subscription>,
    poller: Option<Poller>,
}

impl StatsAggregator {
    /// Starts an aggregator with the default dashboard entries, polling at
    /// the store's configured interval.
    pub fn start(store: &Store) -> StoreResult<Self> {
        let interval = store.config().stats_poll_interval();
        Self::with_entries(store, default_entries(), Some(interval))
    }

    /// Starts an aggregator for `entries`; `poll_interval = None` disables
    /// the timer so only publishes and `refresh()` recompute.
    pub fn with_entries(
        store: &Store,
        entries: Vec<StatEntry>,
        poll_interval: Option<Duration>,
    ) -> StoreResult<Self> {
        let dependencies: Vec<&'static str> = entries
            .iter()
            .flat_map(|entry| entry.dependencies.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let shared = Arc::new(AggregatorShared {
            store: store.clone(),
            entries,
            dependencies,
            current: Mutex::new(StatsSnapshot::empty(store.clock().today())),
        });

        let mut subscriptions = Vec::with_capacity(shared.dependencies.len());
        for name in &shared.dependencies {
            let weak = Arc::downgrade(&shared);
            subscriptions.push(store.subscribe(name, move |_| {
                if let Some(shared) = weak.upgrade() {
                    shared.recompute();
                }
            })?);
        }

        shared.recompute();
        let poller = poll_interval.and_then(|interval| Poller::spawn(Arc::downgrade(&shared), interval));
        debug!(
            "event=stats_start module=stats status=ok dependencies={} polling={}",
            shared.dependencies.len(),
            poller.is_some()
        );

        Ok(Self {
            shared,
            subscriptions,
            poller,
        })
    }

    /// Current derived values.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.lock_current().clone()
    }

    /// Forces an immediate recomputation and returns the result.
    pub fn refresh(&self) -> StatsSnapshot {
        self.shared.recompute()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// Cancels the polling timer and all subscriptions.
    pub fn stop(mut self) {
        self.poller.take();
        self.subscriptions.clear();
        debug!("event=stats_stop module=stats status=ok");
    }
}
