//! Notification protocol configuration with validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a node delivers notifications addressed to itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalDelivery {
    /// Hand the plaintext straight to the inbox. Nothing is encrypted and no
    /// received row is persisted.
    #[default]
    Inline,
    /// Encrypt to our own key and run the full receive path without a
    /// network hop.
    Loopback,
}

/// Protocol configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Strategy for notifications addressed to this node
    pub local_delivery: LocalDelivery,
    /// Reject senders outside this node's network, domain or account
    pub require_same_fleet: bool,
    /// Synchronous call settings
    pub sync: SyncConfig,
    /// Inbox processor settings
    pub inbox: InboxConfig,
    /// Key lifetime settings
    pub keys: KeyConfig,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            local_delivery: LocalDelivery::Inline,
            require_same_fleet: false,
            sync: SyncConfig::default(),
            inbox: InboxConfig::default(),
            keys: KeyConfig::default(),
        }
    }
}

impl NotifyConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sync.validate()?;
        self.inbox.validate()?;
        self.keys.validate()
    }
}

/// Synchronous call settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Total time a caller waits for a reply
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Poll interval while waiting
    #[serde(with = "humantime_serde")]
    pub wait: Duration,
    /// Upper bound of random jitter added to each poll
    #[serde(with = "humantime_serde")]
    pub jitter: Duration,
    /// How long an in-flight call can be joined by identical callers
    #[serde(with = "humantime_serde")]
    pub in_flight_ttl: Duration,
    /// Extra lifetime of a waiter beyond `timeout`
    #[serde(with = "humantime_serde")]
    pub waiter_grace: Duration,
    /// Maximum entries in each sync table
    pub max_entries: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10 * 60),
            wait: Duration::from_secs(2),
            jitter: Duration::from_millis(250),
            in_flight_ttl: Duration::from_secs(15),
            waiter_grace: Duration::from_secs(5),
            max_entries: 10_000,
        }
    }
}

impl SyncConfig {
    /// Lifetime of an entry in the waiters table.
    pub fn waiter_ttl(&self) -> Duration {
        self.timeout + self.waiter_grace
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.wait.is_zero() || self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "sync.wait and sync.timeout must be non-zero".into(),
            ));
        }
        if self.wait > self.timeout {
            return Err(ConfigError::InvalidTimeout(
                "sync.wait must not exceed sync.timeout".into(),
            ));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::InvalidLimit("sync.max_entries must be > 0".into()));
        }
        Ok(())
    }
}

/// Inbox processor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InboxConfig {
    /// Concurrent handler invocations
    pub workers: usize,
    /// Messages that may wait for a worker before submissions are refused
    pub queue_depth: usize,
    /// Interval of the sweep that picks up messages still marked new
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Maximum messages claimed per sweep
    pub sweep_batch: usize,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            workers: 16,
            queue_depth: 1024,
            sweep_interval: Duration::from_secs(10),
            sweep_batch: 256,
        }
    }
}

impl InboxConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.queue_depth == 0 || self.sweep_batch == 0 {
            return Err(ConfigError::InvalidLimit(
                "inbox.workers, inbox.queue_depth and inbox.sweep_batch must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Key lifetime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Keys expiring within this window trigger rotation, and peers whose
    /// keys all expire within it may introduce a new key
    #[serde(with = "humantime_serde")]
    pub generation_limit: Duration,
    /// How long after entering the restoring state a restore token is honoured
    #[serde(with = "humantime_serde")]
    pub restore_window: Duration,
    /// Number of lock stripes guarding trust record creation
    pub lock_stripes: usize,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            generation_limit: Duration::from_secs(24 * 60 * 60),
            restore_window: Duration::from_secs(24 * 60 * 60),
            lock_stripes: 64,
        }
    }
}

impl KeyConfig {
    /// Lifetime given to newly created keys.
    pub fn key_lifetime(&self) -> Duration {
        self.generation_limit * 3
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.generation_limit.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "keys.generation_limit must be non-zero".into(),
            ));
        }
        if self.lock_stripes == 0 {
            return Err(ConfigError::InvalidLimit("keys.lock_stripes must be > 0".into()));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = NotifyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync.timeout, Duration::from_secs(600));
        assert_eq!(config.sync.waiter_ttl(), Duration::from_secs(605));
        assert_eq!(config.keys.key_lifetime(), Duration::from_secs(3 * 86_400));
    }

    #[test]
    fn test_wait_longer_than_timeout_rejected() {
        let mut config = NotifyConfig::default();
        config.sync.wait = Duration::from_secs(700);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = NotifyConfig::default();
        config.inbox.workers = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));
    }

    #[test]
    fn test_humantime_fields() {
        let json = serde_json::json!({
            "local_delivery": "loopback",
            "sync": { "timeout": "30s", "wait": "500ms" }
        });
        let config: NotifyConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.local_delivery, LocalDelivery::Loopback);
        assert_eq!(config.sync.timeout, Duration::from_secs(30));
        assert_eq!(config.sync.wait, Duration::from_millis(500));
        assert_eq!(config.sync.in_flight_ttl, Duration::from_secs(15));
    }
}
