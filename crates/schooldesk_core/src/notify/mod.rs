//! Bounded, auto-expiring notification queue.
//!
//! # Responsibility
//! - Hold ephemeral UI messages independent of domain collections.
//! - Expire messages by TTL and evict the oldest one on overflow.
//!
//! # Invariants
//! - Entries are ordered newest-first.
//! - Length never exceeds the configured capacity.
//! - Expired entries are never returned by `notifications()`.

use crate::clock::{Clock, SystemClock};
use crate::model::notification::{Notification, NotificationLevel};
use log::debug;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

/// Shared notification queue handle. Clones observe the same queue.
#[derive(Clone)]
pub struct NotificationQueue {
    entries: Arc<Mutex<VecDeque<Notification>>>,
    capacity: usize,
    default_ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl NotificationQueue {
    /// Creates a queue using the system clock.
    ///
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize, default_ttl: Option<Duration>) -> Self {
        Self::with_clock(capacity, default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, default_ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
            default_ttl,
            clock,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueues a notification with the default TTL and returns it.
    pub fn add_notification(
        &self,
        level: NotificationLevel,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Notification {
        self.add_with_ttl(level, title, message, self.default_ttl)
    }

    /// Enqueues a notification with an explicit TTL; `None` never expires.
    ///
    /// At capacity the oldest entry is evicted first.
    pub fn add_with_ttl(
        &self,
        level: NotificationLevel,
        title: impl Into<String>,
        message: impl Into<String>,
        ttl: Option<Duration>,
    ) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4(),
            level,
            title: title.into(),
            message: message.into(),
            created_at_ms: self.clock.now_ms(),
            ttl_ms: ttl.map(|value| u64::try_from(value.as_millis()).unwrap_or(u64::MAX)),
        };

        let mut entries = self.lock();
        purge_expired_locked(&mut entries, self.clock.now_ms());
        while entries.len() >= self.capacity {
            if let Some(evicted) = entries.pop_back() {
                debug!(
                    "event=notification_evict module=notify status=ok id={} level={}",
                    evicted.id,
                    evicted.level.as_str()
                );
            }
        }
        entries.push_front(notification.clone());
        notification
    }

    /// Returns live notifications, newest first, after dropping expired ones.
    pub fn notifications(&self) -> Vec<Notification> {
        let mut entries = self.lock();
        purge_expired_locked(&mut entries, self.clock.now_ms());
        entries.iter().cloned().collect()
    }

    /// Removes one notification. Returns `false` when the id is unknown.
    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drops expired notifications and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        purge_expired_locked(&mut entries, self.clock.now_ms())
    }

    /// Number of live notifications.
    pub fn len(&self) -> usize {
        self.notifications().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn purge_expired_locked(entries: &mut VecDeque<Notification>, now_ms: i64) -> usize {
    let before = entries.len();
    entries.retain(|entry| !entry.is_expired(now_ms));
    before - entries.len()
}
