//! In-memory collection state and immutable snapshots.

use crate::model::record::Record;
use std::ops::Deref;
use std::sync::Arc;

/// Lifecycle of one collection inside a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionState {
    Uninitialized,
    Loading,
    Ready,
    /// Initial read or parse failed; the collection serves an empty fallback.
    Error(String),
}

impl CollectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Error(_) => "error",
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Ready | Self::Error(_))
    }
}

/// Immutable copy of a collection's records at one version.
///
/// Cloning is cheap; all clones share the same record buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    name: Arc<str>,
    version: u64,
    records: Arc<[Record]>,
}

impl Snapshot {
    pub(crate) fn new(name: &str, version: u64, records: &[Record]) -> Self {
        Self {
            name: Arc::from(name),
            version,
            records: Arc::from(records),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn find(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn to_vec(&self) -> Vec<Record> {
        self.records.to_vec()
    }
}

impl Deref for Snapshot {
    type Target = [Record];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

/// Mutable collection slot owned by the store.
#[derive(Debug)]
pub(crate) struct Collection {
    pub(crate) name: String,
    pub(crate) records: Vec<Record>,
    pub(crate) version: u64,
    pub(crate) state: CollectionState,
}

impl Collection {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: Vec::new(),
            version: 0,
            state: CollectionState::Uninitialized,
        }
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot::new(&self.name, self.version, &self.records)
    }

    /// Installs committed records and advances the version.
    pub(crate) fn commit(&mut self, records: Vec<Record>) -> Snapshot {
        self.records = records;
        self.version += 1;
        self.state = CollectionState::Ready;
        self.snapshot()
    }
}
