//! Typed error definitions for the routing API.
//!
//! This module provides a structured error hierarchy with specific error types
//! for different domains. All errors are designed to be:
//!
//! - **Serializable** for API responses via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** for error handling logic via enum variants
//! - **Composable** via thiserror derive macros

mod config;
mod lock;
mod registry;

pub use config::ConfigError;
pub use lock::LockError;
pub use registry::RegistryError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type that wraps all domain-specific errors.
///
/// Use this when you need a single error type that can represent
/// any routing API error.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "domain", content = "error")]
pub enum TypedError {
    /// Wraps a lock or presence error
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// Wraps a route registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Wraps a configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Standard Result type using TypedError.
pub type Result<T> = std::result::Result<T, TypedError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = TypedError::Registry(RegistryError::NotFound { key: "api.example.com".to_string() });

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("Registry"));
        assert!(json.contains("api.example.com"));

        let deserialized: TypedError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, deserialized);
    }

    #[test]
    fn test_error_display() {
        let err = LockError::LockLost { key: "routing-api-lock".to_string() };

        let msg = format!("{}", TypedError::from(err));
        assert!(msg.contains("Lock error"));
        assert!(msg.contains("routing-api-lock"));
    }
}
