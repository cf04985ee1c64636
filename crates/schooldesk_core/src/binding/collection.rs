//! Live per-consumer view of one collection.
//!
//! # Responsibility
//! - Load (and optionally seed) the collection on activation.
//! - Track committed snapshots through a store subscription.
//! - Apply CRUD changes optimistically and roll back on failure.
//!
//! # Invariants
//! - A snapshot with a version not newer than the view's is ignored.
//! - After a failed mutation the view equals the store's committed snapshot.
//! - A deactivated binding never changes again.

use crate::model::notification::NotificationLevel;
use crate::model::record::{Record, RecordPatch};
use crate::store::{CollectionState, Snapshot, Store, StoreError, StoreResult, Subscription};
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct BindingView {
    records: Vec<Record>,
    version: Option<u64>,
    loading: bool,
    active: bool,
}

impl BindingView {
    fn loading() -> Self {
        Self {
            records: Vec::new(),
            version: None,
            loading: true,
            active: true,
        }
    }

    fn apply_newer(&mut self, snapshot: &Snapshot) {
        if !self.active {
            return;
        }
        if self.version.is_some_and(|current| snapshot.version() <= current) {
            return;
        }
        self.replace(snapshot);
    }

    /// Discards optimistic edits in favour of `snapshot` unless a newer
    /// snapshot already replaced them. Equal versions are applied because a
    /// failed mutation leaves the store version unchanged.
    fn restore(&mut self, snapshot: &Snapshot) {
        if self.version.is_some_and(|current| snapshot.version() < current) {
            return;
        }
        self.replace(snapshot);
    }

    fn replace(&mut self, snapshot: &Snapshot) {
        self.records = snapshot.to_vec();
        self.version = Some(snapshot.version());
    }
}

/// Live view of one collection held by one consumer.
///
/// Dropping the binding unsubscribes it.
pub struct CollectionBinding {
    store: Store,
    name: String,
    view: Arc<Mutex<BindingView>>,
    subscription: Option<Subscription>,
}

impl CollectionBinding {
    /// Activates a binding without seeding.
    pub fn activate(store: &Store, name: &str) -> StoreResult<Self> {
        Self::activate_inner(store, name, None::<fn() -> Vec<Record>>)
    }

    /// Activates a binding, seeding the collection from `factory` when it is
    /// empty and has never been seeded.
    ///
    /// A seed failure does not fail activation; it queues an error
    /// notification and the view shows whatever the store holds.
    pub fn activate_seeded<F>(store: &Store, name: &str, factory: F) -> StoreResult<Self>
    where
        F: FnOnce() -> Vec<Record>,
    {
        Self::activate_inner(store, name, Some(factory))
    }

    fn activate_inner<F>(store: &Store, name: &str, seed: Option<F>) -> StoreResult<Self>
    where
        F: FnOnce() -> Vec<Record>,
    {
        let view = Arc::new(Mutex::new(BindingView::loading()));
        let weak_view = Arc::downgrade(&view);
        let subscription = store.subscribe(name, move |snapshot| {
            if let Some(view) = weak_view.upgrade() {
                lock(&view).apply_newer(snapshot);
            }
        })?;

        let mut snapshot = store.get_all(name)?;
        if snapshot.is_empty() {
            if let Some(factory) = seed {
                match store.ensure_seeded(name, factory) {
                    Ok(_) => snapshot = store.get_all(name)?,
                    Err(err) => {
                        warn!(
                            "event=binding_activate module=binding status=error collection={name} error_code={} error={}",
                            err.code(),
                            err
                        );
                        store.notifications().add_notification(
                            NotificationLevel::Error,
                            "Sample data failed",
                            err.to_string(),
                        );
                    }
                }
            }
        }

        {
            let mut guard = lock(&view);
            guard.apply_newer(&snapshot);
            guard.loading = false;
        }
        debug!(
            "event=binding_activate module=binding status=ok collection={name} version={} count={}",
            snapshot.version(),
            snapshot.len()
        );

        Ok(Self {
            store: store.clone(),
            name: name.to_string(),
            view,
            subscription: Some(subscription),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records currently rendered by this consumer.
    pub fn items(&self) -> Vec<Record> {
        self.lock_view().records.clone()
    }

    pub fn find(&self, id: &str) -> Option<Record> {
        self.lock_view()
            .records
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_view().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn loading(&self) -> bool {
        self.lock_view().loading
    }

    /// Version of the last snapshot applied to the view.
    pub fn version(&self) -> u64 {
        self.lock_view().version.unwrap_or_default()
    }

    pub fn state(&self) -> CollectionState {
        self.store.state(&self.name)
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Shows `record` immediately, then commits it through the store.
    pub fn add_item(&self, record: Record) -> StoreResult<()> {
        self.lock_view().records.push(record.clone());
        let result = self.store.add(&self.name, record).map(|_| ());
        self.settle(result)
    }

    /// Shows the merged record immediately, then commits the patch.
    pub fn update_item(&self, id: &str, patch: &RecordPatch) -> StoreResult<Record> {
        {
            let mut view = self.lock_view();
            if let Some(record) = view.records.iter_mut().find(|record| record.id == id) {
                record.apply_patch(patch);
            }
        }
        let result = self.store.update(&self.name, id, patch);
        self.settle(result)
    }

    /// Hides the record immediately, then commits the removal.
    pub fn remove_item(&self, id: &str) -> StoreResult<Record> {
        self.lock_view().records.retain(|record| record.id != id);
        let result = self.store.remove(&self.name, id);
        self.settle(result)
    }

    /// Unsubscribes; the view keeps its last contents but never changes again.
    pub fn deactivate(mut self) {
        self.release();
    }

    fn settle<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(err) = &result {
            self.rollback(err);
        }
        result
    }

    fn rollback(&self, cause: &StoreError) {
        match self.store.get_all(&self.name) {
            Ok(snapshot) => {
                lock(&self.view).restore(&snapshot);
                debug!(
                    "event=binding_rollback module=binding status=ok collection={} version={} cause={}",
                    self.name,
                    snapshot.version(),
                    cause.code()
                );
            }
            Err(err) => warn!(
                "event=binding_rollback module=binding status=error collection={} error={}",
                self.name, err
            ),
        }
    }

    fn release(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            lock(&self.view).active = false;
            subscription.unsubscribe();
            debug!(
                "event=binding_deactivate module=binding status=ok collection={}",
                self.name
            );
        }
    }

    fn lock_view(&self) -> MutexGuard<'_, BindingView> {
        lock(&self.view)
    }
}

impl Drop for CollectionBinding {
    fn drop(&mut self) {
        self.release();
    }
}

fn lock(view: &Mutex<BindingView>) -> MutexGuard<'_, BindingView> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}
