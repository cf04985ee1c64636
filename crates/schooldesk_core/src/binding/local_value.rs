//! Ad hoc keyed JSON document binding.
//!
//! # Responsibility
//! - Bind one serializable value to one storage key.
//! - Persist synchronously on every set.
//!
//! # Invariants
//! - A missing or unreadable key yields the caller's default.
//! - The in-memory value always reflects the last `set`, even when the
//!   write-through failed; the failure is returned to the caller.
//! - No id uniqueness, seeding or change notification is provided.

use crate::storage::{StorageError, StorageHandle};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Keyed value persistence failure.
#[derive(Debug)]
pub enum LocalValueError {
    Serialization(serde_json::Error),
    Storage(StorageError),
}

impl Display for LocalValueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(err) => write!(f, "failed to serialize value: {err}"),
            Self::Storage(err) => write!(f, "failed to persist value: {err}"),
        }
    }
}

impl Error for LocalValueError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Serialization(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for LocalValueError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<StorageError> for LocalValueError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// One JSON document bound to one storage key.
pub struct LocalValue<T> {
    storage: StorageHandle,
    key: String,
    default: T,
    value: T,
}

/// Binds `key` to a value, reading the persisted document or `default`.
pub fn use_local_storage<T>(storage: &StorageHandle, key: impl Into<String>, default: T) -> LocalValue<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    let key = key.into();
    let value = read_or_default(storage, &key, &default);
    LocalValue {
        storage: storage.clone(),
        key,
        default,
        value,
    }
}

impl<T> LocalValue<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Replaces the value and writes it through to storage.
    pub fn set(&mut self, value: T) -> Result<(), LocalValueError> {
        self.value = value;
        self.persist()
    }

    /// Functional setter: derives the next value from the current one.
    pub fn update(&mut self, next: impl FnOnce(&T) -> T) -> Result<(), LocalValueError> {
        let value = next(&self.value);
        self.set(value)
    }

    /// Re-reads the persisted document after an external-change signal.
    pub fn reload(&mut self) -> &T {
        self.value = read_or_default(&self.storage, &self.key, &self.default);
        &self.value
    }

    /// Deletes the persisted document and resets to the default.
    pub fn remove(&mut self) -> Result<(), LocalValueError> {
        self.storage.remove(&self.key)?;
        self.value = self.default.clone();
        Ok(())
    }

    fn persist(&self) -> Result<(), LocalValueError> {
        let result = serde_json::to_string(&self.value)
            .map_err(LocalValueError::from)
            .and_then(|json| self.storage.write(&self.key, &json).map_err(LocalValueError::from));
        if let Err(err) = &result {
            warn!(
                "event=local_value_write module=binding status=error key={} error={}",
                self.key, err
            );
        }
        result
    }
}

fn read_or_default<T>(storage: &StorageHandle, key: &str, default: &T) -> T
where
    T: DeserializeOwned + Clone,
{
    match storage.read(key) {
        Ok(Some(json)) => match serde_json::from_str(&json) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    "event=local_value_read module=binding status=error key={key} error_code=parse_failed error={err}"
                );
                default.clone()
            }
        },
        Ok(None) => default.clone(),
        Err(err) => {
            warn!(
                "event=local_value_read module=binding status=error key={key} error_code=read_failed error={err}"
            );
            default.clone()
        }
    }
}
