//! Collection store, subscription bus and their error taxonomy.
//!
//! # Responsibility
//! - Own named record collections layered on a storage adapter.
//! - Publish committed snapshots to subscribers.
//! - Convert storage failures into semantic, non-fatal errors.
//!
//! # Invariants
//! - A failed mutation never changes the in-memory snapshot.
//! - `version` strictly increases with every committed mutation.
//! - Subscriber failures never block delivery to other subscribers.

use crate::model::record::{RecordId, RecordValidationError};
use crate::storage::StorageError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod bus;
pub mod collection;
pub mod registry;

pub use bus::{SubscriberError, Subscription, SubscriptionBus};
pub use collection::{CollectionState, Snapshot};
pub use registry::{SeedOutcome, Store};

pub type StoreResult<T> = Result<T, StoreError>;

/// Write-through failure. The mutation was not committed.
#[derive(Debug)]
pub enum PersistError {
    Storage(StorageError),
    Serialization(serde_json::Error),
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "persist failed: {err}"),
            Self::Serialization(err) => write!(f, "persist failed to serialize: {err}"),
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Serialization(err) => Some(err),
        }
    }
}

impl From<StorageError> for PersistError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Reason a one-time seed write failed.
#[derive(Debug)]
pub enum SeedError {
    DuplicateId(RecordId),
    InvalidRecord(RecordValidationError),
    Persist(PersistError),
}

impl Display for SeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "seed data contains duplicate id `{id}`"),
            Self::InvalidRecord(err) => write!(f, "seed data contains invalid record: {err}"),
            Self::Persist(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DuplicateId(_) => None,
            Self::InvalidRecord(err) => Some(err),
            Self::Persist(err) => Some(err),
        }
    }
}

/// Collection store operation error.
#[derive(Debug)]
pub enum StoreError {
    InvalidCollectionName(String),
    InvalidRecord(RecordValidationError),
    DuplicateId {
        collection: String,
        id: RecordId,
    },
    NotFound {
        collection: String,
        id: RecordId,
    },
    Persist(PersistError),
    Seed {
        collection: String,
        cause: SeedError,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCollectionName(name) => write!(f, "invalid collection name: `{name}`"),
            Self::InvalidRecord(err) => write!(f, "{err}"),
            Self::DuplicateId { collection, id } => {
                write!(f, "record `{id}` already exists in `{collection}`")
            }
            Self::NotFound { collection, id } => {
                write!(f, "record `{id}` not found in `{collection}`")
            }
            Self::Persist(err) => write!(f, "{err}"),
            Self::Seed { collection, cause } => {
                write!(f, "seeding `{collection}` failed: {cause}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRecord(err) => Some(err),
            Self::Persist(err) => Some(err),
            Self::Seed { cause, .. } => Some(cause),
            Self::InvalidCollectionName(_) => None,
            Self::DuplicateId { .. } => None,
            Self::NotFound { .. } => None,
        }
    }
}

impl From<RecordValidationError> for StoreError {
    fn from(value: RecordValidationError) -> Self {
        Self::InvalidRecord(value)
    }
}

impl From<PersistError> for StoreError {
    fn from(value: PersistError) -> Self {
        Self::Persist(value)
    }
}

impl StoreError {
    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCollectionName(_) => "invalid_collection_name",
            Self::InvalidRecord(_) => "invalid_record",
            Self::DuplicateId { .. } => "duplicate_id",
            Self::NotFound { .. } => "not_found",
            Self::Persist(_) => "persist_failed",
            Self::Seed { .. } => "seed_failed",
        }
    }
}
