//! Domain-neutral data model for the local store.
//!
//! # Responsibility
//! - Define the record shape every dashboard collection stores.
//! - Define ephemeral UI notifications.
//!
//! # Invariants
//! - Every record is identified by a non-blank `id` unique in its collection.
//! - Notifications are never persisted.

pub mod notification;
pub mod record;
