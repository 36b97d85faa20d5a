//! Route registry configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// TTL and change-feed settings for the route registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct RegistryConfig {
    /// Upper bound for a route TTL, also used when a route omits its TTL
    #[validate(range(min = 1_u32))]
    #[serde(default = "default_max_ttl")]
    pub max_ttl_secs: u32,
    /// How often expired records are swept and announced as `Expire` events
    #[validate(range(min = 1_u64))]
    #[serde(default = "default_sweep_interval")]
    pub expiry_sweep_interval_ms: u64,
    /// Per-filter event buffer; subscribers further behind than this are cut off
    #[validate(range(min = 1_usize))]
    #[serde(default = "default_watch_buffer")]
    pub watch_buffer: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_ttl_secs: default_max_ttl(),
            expiry_sweep_interval_ms: default_sweep_interval(),
            watch_buffer: default_watch_buffer(),
        }
    }
}

impl RegistryConfig {
    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_sweep_interval_ms)
    }
}

const fn default_max_ttl() -> u32 {
    120
}

const fn default_sweep_interval() -> u64 {
    5_000
}

const fn default_watch_buffer() -> usize {
    1_024
}
