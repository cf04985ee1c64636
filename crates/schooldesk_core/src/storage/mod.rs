//! Durable key/value persistence adapters.
//!
//! # Responsibility
//! - Define the key -> JSON blob contract shared by the collection store and
//!   ad hoc keyed values.
//! - Provide SQLite-backed and in-memory implementations.
//!
//! # Invariants
//! - Adapters carry no business logic; values are opaque UTF-8 JSON text.
//! - A failed write leaves the previously stored value untouched.
//! - Quota checks count key and value bytes of every stored entry.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence adapter failure.
#[derive(Debug)]
pub enum StorageError {
    /// Underlying SQLite failure.
    Db(DbError),
    /// Writing the entry would exceed the configured byte budget.
    QuotaExceeded {
        key: String,
        required_bytes: u64,
        quota_bytes: u64,
    },
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::QuotaExceeded {
                key,
                required_bytes,
                quota_bytes,
            } => write!(
                f,
                "storage quota exceeded writing `{key}`: {required_bytes} bytes required, {quota_bytes} allowed"
            ),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::QuotaExceeded { .. } => None,
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Key -> JSON blob persistence contract.
pub trait StorageAdapter: Send {
    /// Reads one value; `None` when the key was never written or was removed.
    fn read(&self, key: &str) -> StorageResult<Option<String>>;
    /// Writes one value synchronously, replacing any previous value.
    fn write(&mut self, key: &str, value: &str) -> StorageResult<()>;
    /// Removes one key. Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> StorageResult<()>;
    /// Lists stored keys in ascending order.
    fn keys(&self) -> StorageResult<Vec<String>>;
}

/// Shared, lockable handle to one storage adapter.
///
/// The collection store and every `LocalValue` built from the same handle
/// write through the same adapter.
#[derive(Clone)]
pub struct StorageHandle {
    adapter: Arc<Mutex<Box<dyn StorageAdapter>>>,
}

impl StorageHandle {
    pub fn new(adapter: impl StorageAdapter + 'static) -> Self {
        Self {
            adapter: Arc::new(Mutex::new(Box::new(adapter))),
        }
    }

    pub fn read(&self, key: &str) -> StorageResult<Option<String>> {
        self.lock().read(key)
    }

    pub fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.lock().write(key, value)
    }

    pub fn remove(&self, key: &str) -> StorageResult<()> {
        self.lock().remove(key)
    }

    pub fn keys(&self) -> StorageResult<Vec<String>> {
        self.lock().keys()
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn StorageAdapter>> {
        self.adapter.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}
