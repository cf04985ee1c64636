#![allow(dead_code)]

use schooldesk_core::{MemoryStorage, StorageAdapter, StorageError};
use std::sync::{Arc, Mutex};

/// Keys whose writes or removes should fail, matched by substring.
#[derive(Default)]
pub struct Faults {
    writes: Mutex<Vec<String>>,
    removes: Mutex<Vec<String>>,
}

impl Faults {
    pub fn fail_writes(&self, pattern: &str) {
        self.writes.lock().unwrap().push(pattern.to_string());
    }

    pub fn fail_removes(&self, pattern: &str) {
        self.removes.lock().unwrap().push(pattern.to_string());
    }

    pub fn heal(&self) {
        self.writes.lock().unwrap().clear();
        self.removes.lock().unwrap().clear();
    }

    fn check(patterns: &Mutex<Vec<String>>, key: &str) -> Result<(), StorageError> {
        if patterns
            .lock()
            .unwrap()
            .iter()
            .any(|pattern| key.contains(pattern.as_str()))
        {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                required_bytes: 0,
                quota_bytes: 0,
            });
        }
        Ok(())
    }
}

/// Memory adapter that fails selected operations on demand.
pub struct FaultyStorage {
    inner: MemoryStorage,
    faults: Arc<Faults>,
}

impl FaultyStorage {
    pub fn new() -> (Self, Arc<Faults>) {
        let faults = Arc::new(Faults::default());
        (
            Self {
                inner: MemoryStorage::new(),
                faults: Arc::clone(&faults),
            },
            faults,
        )
    }
}

impl StorageAdapter for FaultyStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        Faults::check(&self.faults.writes, key)?;
        self.inner.write(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        Faults::check(&self.faults.removes, key)?;
        self.inner.remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.inner.keys()
    }
}
