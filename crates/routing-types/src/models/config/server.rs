//! Daemon configuration.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use validator::Validate;

use super::lock::{LockConfig, PresenceConfig};
use super::registry::RegistryConfig;
use crate::error::ConfigError;

/// Full daemon configuration.
///
/// Every field has a default so an empty JSON object is a valid config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    #[validate(length(min = 1_u64))]
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port to listen on
    #[validate(range(min = 1_u16))]
    #[serde(default = "default_port")]
    pub port: u16,
    /// PostgreSQL URL; in-memory backends are used when absent
    #[serde(default)]
    pub database_url: Option<String>,
    /// Leader lock
    #[serde(default)]
    #[validate(nested)]
    pub lock: LockConfig,
    /// Optional per-replica presence marker
    #[serde(default)]
    pub presence: Option<PresenceConfig>,
    /// Route registry
    #[serde(default)]
    #[validate(nested)]
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            database_url: None,
            lock: LockConfig::default(),
            presence: None,
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Validate every section, including the optional presence block.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate().map_err(|e| ConfigError::from_validation_errors(&e))?;
        self.socket_addr()?;
        if let Some(presence) = &self.presence {
            presence.validate().map_err(|e| ConfigError::from_validation_errors(&e))?;
            if presence.key == self.lock.key {
                return Err(ConfigError::ValidationError {
                    field: "presence.key".to_string(),
                    message: "presence key must differ from the lock key".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Address the HTTP listener binds to. `bind_address` must be an IP literal.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.bind_address.parse().map_err(|_| ConfigError::ValidationError {
            field: "bind_address".to_string(),
            message: format!("'{}' is not an IP address", self.bind_address),
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}
