//! Route registry errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum RegistryError {
    /// Key or prefix is absent. Idempotent delete paths treat this as success.
    #[error("Record not found: {key}")]
    NotFound { key: String },

    /// Route failed validation before it reached the store
    #[error("Invalid route: {message}")]
    InvalidRoute { message: String },

    /// Storage backend failure
    #[error("Database error: {message}")]
    Database { message: String },

    /// Record could not be encoded or decoded
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// The store closed the watch from its side
    #[error("Watch closed")]
    WatchClosed,

    /// The subscriber fell behind the event feed and missed events
    #[error("Watch lagged behind by {skipped} events")]
    Lagged { skipped: u64 },
}

impl RegistryError {
    /// Short machine-readable name used in API error bodies.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "ResourceNotFoundError",
            Self::InvalidRoute { .. } => "RouteInvalidError",
            Self::Database { .. } => "DBCommunicationError",
            Self::Serialization { .. } => "ProcessRequestError",
            Self::WatchClosed | Self::Lagged { .. } => "WatchError",
        }
    }

    /// Check if this is a client error (4xx equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidRoute { .. })
    }

    /// Get HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidRoute { .. } | Self::Serialization { .. } => 400,
            Self::Database { .. } => 503,
            Self::WatchClosed | Self::Lagged { .. } => 500,
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_codes() {
        assert_eq!(RegistryError::NotFound { key: "k".to_string() }.http_status_code(), 404);
        assert_eq!(
            RegistryError::InvalidRoute { message: "bad".to_string() }.http_status_code(),
            400
        );
        assert_eq!(
            RegistryError::Database { message: "down".to_string() }.http_status_code(),
            503
        );
    }

    #[test]
    fn test_client_errors() {
        assert!(RegistryError::NotFound { key: "k".to_string() }.is_client_error());
        assert!(!RegistryError::WatchClosed.is_client_error());
    }
}
