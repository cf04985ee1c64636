//! Local-first reactive data store for SchoolDesk dashboards.
//! This crate owns collection persistence, change fan-out, derived
//! statistics and UI notifications; it has no UI framework dependency.

pub mod binding;
pub mod clock;
pub mod collections;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod sample;
pub mod stats;
pub mod storage;
pub mod store;

pub use binding::{use_local_storage, CollectionBinding, LocalValue, LocalValueError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::notification::{Notification, NotificationLevel};
pub use model::record::{patch, Record, RecordId, RecordPatch, RecordValidationError};
pub use notify::NotificationQueue;
pub use stats::{StatEntry, StatValue, StatsAggregator, StatsSnapshot};
pub use storage::{MemoryStorage, SqliteStorage, StorageAdapter, StorageError, StorageHandle};
pub use store::{
    CollectionState, PersistError, SeedError, SeedOutcome, Snapshot, Store, StoreError,
    StoreResult, SubscriberError, Subscription,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
