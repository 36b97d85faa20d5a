//! Leader lock and presence configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Authoritative leader lock configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct LockConfig {
    /// Coordination key contended by all replicas
    #[validate(length(min = 1_u64))]
    #[serde(default = "default_lock_key")]
    pub key: String,
    /// Value written under the key while held; defaults to `<hostname>-<pid>`
    #[serde(default)]
    pub owner_value: Option<String>,
    /// Session TTL in seconds; the session is renewed every half TTL
    #[validate(range(min = 1_u64))]
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    /// Delay between failed acquisition attempts
    #[validate(range(min = 1_u64))]
    #[serde(default = "default_retry_interval")]
    pub retry_interval_ms: u64,
    /// Backend polling cadence while waiting on or watching a key
    #[validate(range(min = 1_u64))]
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key: default_lock_key(),
            owner_value: None,
            session_ttl_secs: default_session_ttl(),
            retry_interval_ms: default_retry_interval(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl LockConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Advisory presence marker configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct PresenceConfig {
    #[validate(length(min = 1_u64))]
    pub key: String,
    #[validate(range(min = 1_u64))]
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

impl PresenceConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

fn default_lock_key() -> String {
    "routing_api_lock".to_string()
}

const fn default_session_ttl() -> u64 {
    15
}

const fn default_retry_interval() -> u64 {
    5_000
}

const fn default_poll_interval() -> u64 {
    1_000
}
