//! Ephemeral UI notification model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a UI notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
    Info,
    Warning,
}

impl NotificationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
            Self::Warning => "warning",
        }
    }
}

/// One toast/badge message shown by dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    /// Unix epoch milliseconds.
    pub created_at_ms: i64,
    /// `None` keeps the notification until dismissed or evicted.
    pub ttl_ms: Option<u64>,
}

impl Notification {
    /// Returns whether the notification's TTL has elapsed at `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.ttl_ms {
            Some(ttl_ms) => {
                let expires_at = self
                    .created_at_ms
                    .saturating_add(i64::try_from(ttl_ms).unwrap_or(i64::MAX));
                now_ms >= expires_at
            }
            None => false,
        }
    }
}
