//! Explicit collection registry with write-through persistence.
//!
//! # Responsibility
//! - Lazily load named collections once, then serve them from memory.
//! - Apply add/update/remove with id-uniqueness checks and write-through.
//! - Run one-time seeding guarded by a persisted marker.
//! - Publish committed snapshots through the subscription bus.
//!
//! # Invariants
//! - The persisted blob of a loaded collection equals its in-memory records.
//! - Mutations commit only after the storage write succeeds.
//! - Seeding for one collection runs at most once per persisted marker.
//! - Snapshots are published after the registry lock is released.

use crate::binding::local_value::{use_local_storage, LocalValue};
use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::model::notification::NotificationLevel;
use crate::model::record::{is_valid_collection_name, Record, RecordPatch};
use crate::notify::NotificationQueue;
use crate::storage::{MemoryStorage, SqliteStorage, StorageError, StorageHandle};
use crate::store::bus::{Subscription, SubscriptionBus};
use crate::store::collection::{Collection, CollectionState, Snapshot};
use crate::store::{PersistError, SeedError, StoreError, StoreResult};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const SEED_MARKER_VALUE: &str = "true";

/// Result of an `ensure_seeded` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Sample records were written and the marker was set.
    Seeded { count: usize },
    /// The collection already held records; only the marker was set.
    KeptExisting { count: usize },
    /// The marker was already set; nothing happened.
    AlreadySeeded,
}

struct StoreInner {
    config: StoreConfig,
    storage: StorageHandle,
    collections: Mutex<HashMap<String, Collection>>,
    bus: SubscriptionBus,
    notifications: NotificationQueue,
    clock: Arc<dyn Clock>,
}

/// Registry of named record collections.
///
/// Create one per application and pass clones to bindings; clones share
/// every collection, subscriber and notification.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Creates a store over `storage` using the system clock.
    pub fn new(storage: StorageHandle, config: StoreConfig) -> Self {
        Self::with_clock(storage, config, Arc::new(SystemClock))
    }

    pub fn with_clock(storage: StorageHandle, config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        let notifications = NotificationQueue::with_clock(
            config.notification_capacity,
            Some(config.notification_ttl()),
            Arc::clone(&clock),
        );
        Self {
            inner: Arc::new(StoreInner {
                config,
                storage,
                collections: Mutex::new(HashMap::new()),
                bus: SubscriptionBus::new(),
                notifications,
                clock,
            }),
        }
    }

    /// Opens a SQLite-backed store at `path`.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self, StorageError> {
        let storage = SqliteStorage::open(path)?.with_quota(config.storage_quota_bytes);
        Ok(Self::new(StorageHandle::new(storage), config))
    }

    /// Creates a volatile store honoring the configured quota.
    pub fn in_memory(config: StoreConfig) -> Self {
        let storage = match config.storage_quota_bytes {
            Some(quota_bytes) => MemoryStorage::with_quota(quota_bytes),
            None => MemoryStorage::new(),
        };
        Self::new(StorageHandle::new(storage), config)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Shared storage handle, also used by ad hoc keyed values.
    pub fn storage(&self) -> &StorageHandle {
        &self.inner.storage
    }

    /// Binds an ad hoc JSON document to `key` on this store's storage.
    ///
    /// The key is used verbatim, without the collection key prefix.
    pub fn local_value<T>(&self, key: &str, default: T) -> LocalValue<T>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        use_local_storage(&self.inner.storage, key, default)
    }

    /// Shared notification queue.
    pub fn notifications(&self) -> &NotificationQueue {
        &self.inner.notifications
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    /// Returns the current snapshot, loading the collection on first access.
    ///
    /// A failed initial load falls back to an empty collection in
    /// `CollectionState::Error` and queues an error notification.
    pub fn get_all(&self, name: &str) -> StoreResult<Snapshot> {
        ensure_valid_name(name)?;
        let mut collections = self.lock_collections();
        Ok(self.load_locked(&mut collections, name).snapshot())
    }

    pub fn get_by_id(&self, name: &str, id: &str) -> StoreResult<Option<Record>> {
        Ok(self.get_all(name)?.find(id).cloned())
    }

    /// Current version; `0` for collections never loaded or mutated.
    pub fn version(&self, name: &str) -> u64 {
        self.lock_collections()
            .get(name)
            .map_or(0, |collection| collection.version)
    }

    pub fn state(&self, name: &str) -> CollectionState {
        self.lock_collections()
            .get(name)
            .map_or(CollectionState::Uninitialized, |collection| {
                collection.state.clone()
            })
    }

    /// Appends `record`. Rejects ids already present in the collection.
    pub fn add(&self, name: &str, record: Record) -> StoreResult<Snapshot> {
        let (snapshot, ()) = self.mutate(name, "add", |collection| {
            record.validate()?;
            if collection.position(&record.id).is_some() {
                return Err(StoreError::DuplicateId {
                    collection: collection.name.clone(),
                    id: record.id.clone(),
                });
            }
            let mut next = collection.records.clone();
            next.push(record);
            Ok((next, ()))
        })?;
        Ok(snapshot)
    }

    /// Merges `patch` into record `id` and returns the merged record.
    pub fn update(&self, name: &str, id: &str, patch: &RecordPatch) -> StoreResult<Record> {
        let (_, updated) = self.mutate(name, "update", |collection| {
            let index = collection
                .position(id)
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.name.clone(),
                    id: id.to_string(),
                })?;
            let mut next = collection.records.clone();
            next[index].apply_patch(patch);
            let updated = next[index].clone();
            Ok((next, updated))
        })?;
        Ok(updated)
    }

    /// Deletes record `id` and returns it.
    pub fn remove(&self, name: &str, id: &str) -> StoreResult<Record> {
        let (_, removed) = self.mutate(name, "remove", |collection| {
            let index = collection
                .position(id)
                .ok_or_else(|| StoreError::NotFound {
                    collection: collection.name.clone(),
                    id: id.to_string(),
                })?;
            let mut next = collection.records.clone();
            let removed = next.remove(index);
            Ok((next, removed))
        })?;
        Ok(removed)
    }

    /// Writes `factory()` as initial content unless the seed marker is set.
    ///
    /// Runs under the registry lock, so concurrent callers for the same
    /// collection observe exactly one seeding. The factory is not called
    /// when the marker is set or the collection already holds records.
    ///
    /// The records are written before the marker, so a failure between the
    /// two writes never leaves a marker over an empty collection.
    pub fn ensure_seeded<F>(&self, name: &str, factory: F) -> StoreResult<SeedOutcome>
    where
        F: FnOnce() -> Vec<Record>,
    {
        ensure_valid_name(name)?;
        let marker_key = self.inner.config.seed_marker_key(name);

        let (outcome, snapshot) = {
            let mut collections = self.lock_collections();
            let marker = self
                .inner
                .storage
                .read(&marker_key)
                .map_err(|err| seed_error(name, SeedError::Persist(err.into())))?;
            if marker.as_deref() == Some(SEED_MARKER_VALUE) {
                debug!(
                    "event=collection_seed module=store status=skipped collection={name} reason=marker_set"
                );
                return Ok(SeedOutcome::AlreadySeeded);
            }

            let collection = self.load_locked(&mut collections, name);
            if !collection.records.is_empty() {
                let count = collection.records.len();
                self.inner
                    .storage
                    .write(&marker_key, SEED_MARKER_VALUE)
                    .map_err(|err| seed_error(name, SeedError::Persist(err.into())))?;
                info!(
                    "event=collection_seed module=store status=ok collection={name} mode=kept_existing count={count}"
                );
                return Ok(SeedOutcome::KeptExisting { count });
            }

            let records = factory();
            validate_seed(&records).map_err(|cause| seed_error(name, cause))?;

            if let Err(err) = self.persist(name, &records) {
                error!(
                    "event=collection_seed module=store status=error collection={name} error_code=seed_failed error={err}"
                );
                return Err(seed_error(name, SeedError::Persist(err)));
            }
            // The blob is durable from here on; an unwritten marker is
            // repaired by the kept-existing branch on the next call.
            if let Err(err) = self.inner.storage.write(&marker_key, SEED_MARKER_VALUE) {
                warn!(
                    "event=collection_seed module=store status=partial collection={name} error_code=marker_write_failed error={err}"
                );
            }

            let count = records.len();
            let snapshot = collection.commit(records);
            info!(
                "event=collection_seed module=store status=ok collection={name} mode=seeded count={count} version={}",
                snapshot.version()
            );
            (SeedOutcome::Seeded { count }, snapshot)
        };

        self.publish(&snapshot);
        Ok(outcome)
    }

    /// Returns whether the seed marker for `name` is persisted.
    pub fn is_seeded(&self, name: &str) -> StoreResult<bool> {
        ensure_valid_name(name)?;
        let marker = self
            .inner
            .storage
            .read(&self.inner.config.seed_marker_key(name))
            .map_err(PersistError::from)?;
        Ok(marker.as_deref() == Some(SEED_MARKER_VALUE))
    }

    /// Registers `callback` for every committed snapshot of `name`.
    pub fn subscribe(
        &self,
        name: &str,
        callback: impl Fn(&Snapshot) + Send + Sync + 'static,
    ) -> StoreResult<Subscription> {
        ensure_valid_name(name)?;
        Ok(self.inner.bus.subscribe(name, callback))
    }

    pub fn subscriber_count(&self, name: &str) -> usize {
        self.inner.bus.subscriber_count(name)
    }

    /// Destroys one collection: removes its blob and seed marker, empties
    /// memory, and publishes the empty snapshot. Intended for tests and
    /// reset tooling.
    pub fn reset(&self, name: &str) -> StoreResult<()> {
        ensure_valid_name(name)?;
        let snapshot = {
            let mut collections = self.lock_collections();
            self.remove_persisted(name)?;
            reset_slot(&mut collections, name)
        };
        info!(
            "event=collection_reset module=store status=ok collection={name} version={}",
            snapshot.version()
        );
        self.publish(&snapshot);
        Ok(())
    }

    /// Resets every collection known in memory or in storage.
    ///
    /// Stops at the first storage failure; collections reset before it are
    /// still published.
    pub fn reset_all(&self) -> StoreResult<()> {
        let (snapshots, failure) = {
            let mut collections = self.lock_collections();
            let mut names: HashSet<String> = collections.keys().cloned().collect();
            names.extend(self.persisted_collection_names()?);

            let mut sorted: Vec<String> = names.into_iter().collect();
            sorted.sort();

            let mut snapshots = Vec::with_capacity(sorted.len());
            let mut failure = None;
            for name in sorted {
                if let Err(err) = self.remove_persisted(&name) {
                    failure = Some(err);
                    break;
                }
                snapshots.push(reset_slot(&mut collections, &name));
            }
            (snapshots, failure)
        };
        for snapshot in &snapshots {
            self.publish(snapshot);
        }
        match failure {
            Some(err) => {
                warn!(
                    "event=store_reset module=store status=partial collections={} error_code={} error={}",
                    snapshots.len(),
                    err.code(),
                    err
                );
                Err(err)
            }
            None => {
                info!(
                    "event=store_reset module=store status=ok collections={}",
                    snapshots.len()
                );
                Ok(())
            }
        }
    }

    fn mutate<T>(
        &self,
        name: &str,
        op: &str,
        apply: impl FnOnce(&Collection) -> StoreResult<(Vec<Record>, T)>,
    ) -> StoreResult<(Snapshot, T)> {
        let result = ensure_valid_name(name).and_then(|()| {
            let mut collections = self.lock_collections();
            let collection = self.load_locked(&mut collections, name);
            let (next, output) = apply(collection)?;
            self.persist(name, &next)?;
            Ok((collection.commit(next), output))
        });

        match result {
            Ok((snapshot, output)) => {
                debug!(
                    "event=collection_{op} module=store status=ok collection={name} version={} count={}",
                    snapshot.version(),
                    snapshot.len()
                );
                self.publish(&snapshot);
                Ok((snapshot, output))
            }
            Err(err) => {
                warn!(
                    "event=collection_{op} module=store status=error collection={name} error_code={} error={}",
                    err.code(),
                    err
                );
                Err(err)
            }
        }
    }

    fn persist(&self, name: &str, records: &[Record]) -> Result<(), PersistError> {
        let json = serde_json::to_string(records)?;
        self.inner
            .storage
            .write(&self.inner.config.collection_key(name), &json)?;
        Ok(())
    }

    fn publish(&self, snapshot: &Snapshot) {
        let failures = self.inner.bus.publish(snapshot);
        if !failures.is_empty() {
            warn!(
                "event=collection_publish module=store status=partial collection={} version={} failed_subscribers={}",
                snapshot.name(),
                snapshot.version(),
                failures.len()
            );
        }
    }

    fn load_locked<'a>(
        &self,
        collections: &'a mut HashMap<String, Collection>,
        name: &str,
    ) -> &'a mut Collection {
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name));
        if collection.state.is_loaded() {
            return collection;
        }

        collection.state = CollectionState::Loading;
        match self.read_persisted(name) {
            Ok(records) => {
                collection.records = records;
                collection.state = CollectionState::Ready;
                debug!(
                    "event=collection_load module=store status=ok collection={name} count={} version={}",
                    collection.records.len(),
                    collection.version
                );
            }
            Err(message) => {
                collection.records = Vec::new();
                collection.state = CollectionState::Error(message.clone());
                error!(
                    "event=collection_load module=store status=error collection={name} error_code=load_failed error={message}"
                );
                self.inner.notifications.add_notification(
                    NotificationLevel::Error,
                    "Data load failed",
                    format!("Could not load `{name}`; showing empty data. {message}"),
                );
            }
        }
        collection
    }

    fn read_persisted(&self, name: &str) -> Result<Vec<Record>, String> {
        let blob = self
            .inner
            .storage
            .read(&self.inner.config.collection_key(name))
            .map_err(|err| err.to_string())?;
        let Some(blob) = blob else {
            return Ok(Vec::new());
        };

        let parsed: Vec<Record> = serde_json::from_str(&blob)
            .map_err(|err| format!("persisted data is not a record array: {err}"))?;

        let mut seen = HashSet::with_capacity(parsed.len());
        let mut records = Vec::with_capacity(parsed.len());
        for record in parsed {
            if record.validate().is_err() || !seen.insert(record.id.clone()) {
                warn!(
                    "event=collection_load module=store status=partial collection={name} error_code=invalid_or_duplicate_record"
                );
                continue;
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Removes the seed marker, then the blob. Either failure leaves storage
    /// matching memory: a blob without a marker is a valid unseeded state.
    fn remove_persisted(&self, name: &str) -> StoreResult<()> {
        let config = &self.inner.config;
        self.inner
            .storage
            .remove(&config.seed_marker_key(name))
            .map_err(PersistError::from)?;
        self.inner
            .storage
            .remove(&config.collection_key(name))
            .map_err(PersistError::from)?;
        Ok(())
    }

    fn persisted_collection_names(&self) -> StoreResult<Vec<String>> {
        let config = &self.inner.config;
        let collection_prefix = config.collection_key("");
        let marker_prefix = config.seed_marker_key("");
        let keys = self.inner.storage.keys().map_err(PersistError::from)?;
        Ok(keys
            .iter()
            .filter_map(|key| {
                key.strip_prefix(collection_prefix.as_str())
                    .or_else(|| key.strip_prefix(marker_prefix.as_str()))
            })
            .filter(|name| is_valid_collection_name(name))
            .map(str::to_string)
            .collect())
    }

    fn lock_collections(&self) -> MutexGuard<'_, HashMap<String, Collection>> {
        self.inner
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn reset_slot(collections: &mut HashMap<String, Collection>, name: &str) -> Snapshot {
    let collection = collections
        .entry(name.to_string())
        .or_insert_with(|| Collection::new(name));
    collection.commit(Vec::new());
    collection.state = CollectionState::Uninitialized;
    collection.snapshot()
}

fn ensure_valid_name(name: &str) -> StoreResult<()> {
    if is_valid_collection_name(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidCollectionName(name.to_string()))
    }
}

fn validate_seed(records: &[Record]) -> Result<(), SeedError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        record.validate().map_err(SeedError::InvalidRecord)?;
        if !seen.insert(record.id.as_str()) {
            return Err(SeedError::DuplicateId(record.id.clone()));
        }
    }
    Ok(())
}

fn seed_error(name: &str, cause: SeedError) -> StoreError {
    StoreError::Seed {
        collection: name.to_string(),
        cause,
    }
}
