//! Store configuration.
//!
//! # Responsibility
//! - Hold tunables for persistence keys, notifications and stats polling.
//! - Load configuration from JSON documents with per-field defaults.
//!
//! # Invariants
//! - A validated config has a non-zero notification capacity and poll interval.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

const DEFAULT_KEY_PREFIX: &str = "schooldesk:";
const DEFAULT_NOTIFICATION_CAPACITY: usize = 5;
const DEFAULT_NOTIFICATION_TTL_MS: u64 = 5_000;
const DEFAULT_STATS_POLL_INTERVAL_MS: u64 = 30_000;
const DEFAULT_STORAGE_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

/// Configuration loading/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Tunables shared by the store, its notification queue and aggregators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Prepended to every persisted collection and seed-marker key.
    pub key_prefix: String,
    /// Maximum number of live notifications.
    pub notification_capacity: usize,
    /// Default notification time-to-live in milliseconds.
    pub notification_ttl_ms: u64,
    /// Stats aggregator polling interval in milliseconds.
    pub stats_poll_interval_ms: u64,
    /// Total byte budget for persisted entries; `None` disables the check.
    pub storage_quota_bytes: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            notification_ttl_ms: DEFAULT_NOTIFICATION_TTL_MS,
            stats_poll_interval_ms: DEFAULT_STATS_POLL_INTERVAL_MS,
            storage_quota_bytes: Some(DEFAULT_STORAGE_QUOTA_BYTES),
        }
    }
}

impl StoreConfig {
    /// Parses and validates a JSON config document.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notification_capacity == 0 {
            return Err(ConfigError::Invalid(
                "notification_capacity must be at least 1".to_string(),
            ));
        }
        if self.stats_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "stats_poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.key_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "key_prefix must not contain whitespace, got `{}`",
                self.key_prefix
            )));
        }
        Ok(())
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_millis(self.notification_ttl_ms)
    }

    pub fn stats_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stats_poll_interval_ms)
    }

    /// Persisted key holding the JSON array of a collection.
    pub fn collection_key(&self, name: &str) -> String {
        format!("{}collection:{name}", self.key_prefix)
    }

    /// Persisted key holding the seed marker of a collection.
    pub fn seed_marker_key(&self, name: &str) -> String {
        format!("{}seeded:{name}", self.key_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StoreConfig};

    #[test]
    fn missing_fields_use_defaults() {
        let config = StoreConfig::from_json_str(r#"{"notification_capacity": 3}"#)
            .expect("partial config should parse");
        assert_eq!(config.notification_capacity, 3);
        assert_eq!(config.stats_poll_interval_ms, 30_000);
        assert_eq!(config.key_prefix, "schooldesk:");
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = StoreConfig::from_json_str(r#"{"notification_capacity": 0}"#)
            .expect_err("zero capacity must be rejected");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn keys_are_namespaced_by_prefix() {
        let config = StoreConfig::default();
        assert_eq!(config.collection_key("students"), "schooldesk:collection:students");
        assert_eq!(config.seed_marker_key("students"), "schooldesk:seeded:students");
    }
}
