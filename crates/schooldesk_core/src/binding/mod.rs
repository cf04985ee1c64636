//! Consumer-facing bindings over store state.
//!
//! # Responsibility
//! - `CollectionBinding`: per-consumer live view of one typed collection with
//!   optimistic CRUD wrappers.
//! - `LocalValue`: one arbitrary JSON document bound to one storage key.
//!
//! # Invariants
//! - New features default to `CollectionBinding`; it is the only strategy
//!   with id uniqueness, seeding and cross-consumer change notification.
//! - `LocalValue` instances on the same key do not observe each other's
//!   writes until `reload()` is called.

pub mod collection;
pub mod local_value;

pub use collection::CollectionBinding;
pub use local_value::{use_local_storage, LocalValue, LocalValueError};
