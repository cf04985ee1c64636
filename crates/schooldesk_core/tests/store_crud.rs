mod common;

use common::FaultyStorage;
use schooldesk_core::{
    patch, CollectionState, MemoryStorage, NotificationLevel, PersistError, Record,
    StorageAdapter, StorageError, StorageHandle, Store, StoreConfig, StoreError,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const STUDENTS_KEY: &str = "schooldesk:collection:students";

fn memory_store() -> (Store, StorageHandle) {
    let storage = StorageHandle::new(MemoryStorage::new());
    (Store::new(storage.clone(), StoreConfig::default()), storage)
}

fn student(id: &str, name: &str) -> Record {
    Record::new(id).with_field("name", name)
}

struct CountingStorage {
    inner: MemoryStorage,
    reads: Arc<AtomicUsize>,
}

impl StorageAdapter for CountingStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.write(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.inner.keys()
    }
}

#[test]
fn add_appends_and_rejects_duplicate_ids() {
    let (store, _) = memory_store();

    let snapshot = store.add("students", student("s-1", "Rahim")).unwrap();
    assert_eq!(snapshot.len(), 1);
    store.add("students", student("s-2", "Karim")).unwrap();

    let err = store
        .add("students", student("s-1", "Someone else"))
        .unwrap_err();
    match err {
        StoreError::DuplicateId { collection, id } => {
            assert_eq!(collection, "students");
            assert_eq!(id, "s-1");
        }
        other => panic!("unexpected error: {other}"),
    }

    let all = store.get_all("students").unwrap();
    let ids: Vec<&str> = all.iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids, vec!["s-1", "s-2"]);
    assert_eq!(
        store.get_by_id("students", "s-1").unwrap().unwrap().get_str("name"),
        Some("Rahim")
    );
}

#[test]
fn blank_ids_are_rejected() {
    let (store, _) = memory_store();
    let err = store.add("students", Record::new("  ")).unwrap_err();
    assert!(matches!(err, StoreError::InvalidRecord(_)));
    assert!(store.get_all("students").unwrap().is_empty());
}

#[test]
fn update_merges_fields_and_keeps_id() {
    let (store, _) = memory_store();
    store
        .add("students", student("s-1", "Rahim").with_field("class", "Class 6"))
        .unwrap();

    let updated = store
        .update(
            "students",
            "s-1",
            &patch([("class", json!("Class 7")), ("id", json!("hijacked"))]),
        )
        .unwrap();

    assert_eq!(updated.id, "s-1");
    assert_eq!(updated.get_str("class"), Some("Class 7"));
    assert_eq!(updated.get_str("name"), Some("Rahim"));
}

#[test]
fn update_of_missing_record_is_not_found() {
    let (store, _) = memory_store();
    store.add("students", student("s-1", "Rahim")).unwrap();
    let version = store.version("students");

    let err = store
        .update("students", "missing", &patch([("name", json!("x"))]))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert_eq!(err.code(), "not_found");
    assert_eq!(store.version("students"), version);
}

#[test]
fn removing_missing_record_leaves_persisted_blob_untouched() {
    let (store, storage) = memory_store();
    store.add("students", student("s-1", "Rahim")).unwrap();
    store.add("students", student("s-2", "Karim")).unwrap();
    let blob_before = storage.read(STUDENTS_KEY).unwrap();
    let version_before = store.version("students");

    let err = store.remove("students", "s-404").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));

    assert_eq!(storage.read(STUDENTS_KEY).unwrap(), blob_before);
    assert_eq!(store.version("students"), version_before);

    let removed = store.remove("students", "s-1").unwrap();
    assert_eq!(removed.get_str("name"), Some("Rahim"));
    assert_eq!(store.get_all("students").unwrap().len(), 1);
}

#[test]
fn persisted_blob_matches_memory_after_every_mutation() {
    let (store, storage) = memory_store();
    store.add("students", student("s-1", "Rahim")).unwrap();
    store
        .update("students", "s-1", &patch([("roll", json!(7))]))
        .unwrap();

    let blob = storage.read(STUDENTS_KEY).unwrap().unwrap();
    let persisted: Vec<Record> = serde_json::from_str(&blob).unwrap();
    assert_eq!(persisted, store.get_all("students").unwrap().to_vec());
}

#[test]
fn records_survive_reopening_sqlite_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("school.db");

    {
        let store = Store::open(&path, StoreConfig::default()).unwrap();
        store.add("teachers", Record::new("t-1").with_field("subject", "Bangla")).unwrap();
        store.add("teachers", Record::new("t-2").with_field("subject", "Physics")).unwrap();
        store.remove("teachers", "t-2").unwrap();
    }

    let reopened = Store::open(&path, StoreConfig::default()).unwrap();
    let teachers = reopened.get_all("teachers").unwrap();
    assert_eq!(teachers.len(), 1);
    assert_eq!(teachers[0].get_str("subject"), Some("Bangla"));
    assert_eq!(reopened.state("teachers"), CollectionState::Ready);
}

#[test]
fn loaded_collections_are_served_from_memory() {
    let reads = Arc::new(AtomicUsize::new(0));
    let storage = StorageHandle::new(CountingStorage {
        inner: MemoryStorage::with_entries([(STUDENTS_KEY, r#"[{"id":"s-1"}]"#)]),
        reads: Arc::clone(&reads),
    });
    let store = Store::new(storage, StoreConfig::default());

    assert_eq!(store.state("students"), CollectionState::Uninitialized);
    assert_eq!(store.get_all("students").unwrap().len(), 1);
    let after_load = reads.load(Ordering::SeqCst);
    assert_eq!(after_load, 1);

    for _ in 0..10 {
        store.get_all("students").unwrap();
        store.get_by_id("students", "s-1").unwrap();
    }
    assert_eq!(reads.load(Ordering::SeqCst), after_load);
}

#[test]
fn quota_failure_keeps_last_committed_snapshot() {
    let config = StoreConfig {
        storage_quota_bytes: Some(64),
        ..StoreConfig::default()
    };
    let store = Store::in_memory(config);
    store.add("students", Record::new("s-1")).unwrap();
    let version = store.version("students");

    let err = store
        .add("students", Record::new("s-2").with_field("bio", "x".repeat(128)))
        .unwrap_err();
    match err {
        StoreError::Persist(PersistError::Storage(StorageError::QuotaExceeded { .. })) => {}
        other => panic!("unexpected error: {other}"),
    }

    let all = store.get_all("students").unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all.version(), version);
}

#[test]
fn corrupt_blob_loads_empty_in_error_state_and_notifies() {
    let storage = StorageHandle::new(MemoryStorage::with_entries([(STUDENTS_KEY, "{not json")]));
    let store = Store::new(storage.clone(), StoreConfig::default());

    assert!(store.get_all("students").unwrap().is_empty());
    assert!(matches!(store.state("students"), CollectionState::Error(_)));

    let notifications = store.notifications().notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].level, NotificationLevel::Error);

    // A later successful mutation replaces the corrupt blob.
    store.add("students", Record::new("s-1")).unwrap();
    assert_eq!(store.state("students"), CollectionState::Ready);
    let blob = storage.read(STUDENTS_KEY).unwrap().unwrap();
    assert_eq!(serde_json::from_str::<Vec<Record>>(&blob).unwrap().len(), 1);
}

#[test]
fn invalid_and_duplicate_persisted_records_are_dropped() {
    let storage = StorageHandle::new(MemoryStorage::with_entries([(
        STUDENTS_KEY,
        r#"[{"id":"s-1","name":"A"},{"id":""},{"id":"s-1","name":"B"},{"id":"s-2"}]"#,
    )]));
    let store = Store::new(storage, StoreConfig::default());

    let all = store.get_all("students").unwrap();
    let ids: Vec<&str> = all.iter().map(|record| record.id.as_str()).collect();
    assert_eq!(ids, vec!["s-1", "s-2"]);
    assert_eq!(all[0].get_str("name"), Some("A"));
    assert_eq!(store.state("students"), CollectionState::Ready);
}

#[test]
fn collections_are_isolated_by_key_prefix() {
    let storage = StorageHandle::new(MemoryStorage::new());
    let first = Store::new(storage.clone(), StoreConfig::default());
    let second = Store::new(
        storage.clone(),
        StoreConfig {
            key_prefix: "other:".to_string(),
            ..StoreConfig::default()
        },
    );

    first.add("fees", Record::new("f-1")).unwrap();
    assert!(second.get_all("fees").unwrap().is_empty());
    assert!(storage.read("other:collection:fees").unwrap().is_none());
}

#[test]
fn reset_all_clears_memory_storage_and_markers() {
    let (store, storage) = memory_store();
    store.ensure_seeded("students", || vec![Record::new("s-1")]).unwrap();
    store.add("fees", Record::new("f-1")).unwrap();

    store.reset_all().unwrap();

    assert!(store.get_all("students").unwrap().is_empty());
    assert!(store.get_all("fees").unwrap().is_empty());
    assert!(!store.is_seeded("students").unwrap());
    assert!(storage.keys().unwrap().is_empty());
}

#[test]
fn failed_marker_removal_leaves_collection_untouched() {
    let (adapter, faults) = FaultyStorage::new();
    let storage = StorageHandle::new(adapter);
    let store = Store::new(storage.clone(), StoreConfig::default());
    store
        .ensure_seeded("students", || vec![Record::new("s-1")])
        .unwrap();
    let version = store.version("students");

    faults.fail_removes("seeded:students");
    assert!(store.reset("students").is_err());

    assert!(storage.read(STUDENTS_KEY).unwrap().is_some());
    assert_eq!(store.get_all("students").unwrap().len(), 1);
    assert_eq!(store.version("students"), version);
    assert!(store.is_seeded("students").unwrap());
}

#[test]
fn failed_blob_removal_keeps_memory_matching_storage() {
    let (adapter, faults) = FaultyStorage::new();
    let storage = StorageHandle::new(adapter);
    let store = Store::new(storage.clone(), StoreConfig::default());
    store
        .ensure_seeded("students", || vec![Record::new("s-1")])
        .unwrap();

    faults.fail_removes("collection:students");
    assert!(store.reset("students").is_err());

    let blob = storage.read(STUDENTS_KEY).unwrap().unwrap();
    let persisted: Vec<Record> = serde_json::from_str(&blob).unwrap();
    assert_eq!(persisted, store.get_all("students").unwrap().to_vec());

    faults.heal();
    store.reset("students").unwrap();
    assert!(store.get_all("students").unwrap().is_empty());
    assert!(storage.read(STUDENTS_KEY).unwrap().is_none());
}

#[test]
fn partial_reset_all_publishes_collections_already_reset() {
    let (adapter, faults) = FaultyStorage::new();
    let storage = StorageHandle::new(adapter);
    let store = Store::new(storage.clone(), StoreConfig::default());
    store.add("applications", Record::new("a-1")).unwrap();
    store.add("students", Record::new("s-1")).unwrap();

    let published = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&published);
    let _subscription = store
        .subscribe("applications", move |snapshot| {
            sink.lock().unwrap().push(snapshot.len());
        })
        .unwrap();

    faults.fail_removes("collection:students");
    assert!(store.reset_all().is_err());

    assert_eq!(*published.lock().unwrap(), vec![0]);
    assert!(store.get_all("applications").unwrap().is_empty());
    assert!(storage
        .read("schooldesk:collection:applications")
        .unwrap()
        .is_none());
    assert_eq!(store.get_all("students").unwrap().len(), 1);
    assert!(storage.read(STUDENTS_KEY).unwrap().is_some());
}
