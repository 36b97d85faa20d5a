//! Lock, presence, and coordination session errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the lock session and the lock/presence maintainers.
///
/// Backend-specific failures are translated into one of these variants at the
/// coordination client boundary.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum LockError {
    /// The backend refused or failed to create a session
    #[error("Failed to create session {name}: {message}")]
    SessionCreate { name: String, message: String },

    /// The backend reports the session as expired or destroyed
    #[error("Session {session_id} is no longer valid")]
    SessionInvalid { session_id: String },

    /// A single acquire attempt failed (retryable)
    #[error("Failed to acquire {key}: {message}")]
    AcquireFailed { key: String, message: String },

    /// Transport or storage failure talking to the coordination backend
    #[error("Coordination backend error: {message}")]
    Backend { message: String },

    /// An authoritative lock was lost after it had been reported as held
    #[error("Lost lock {key}")]
    LockLost { key: String },

    /// An advisory presence key was lost after it had been reported as held
    #[error("Lost presence {key}")]
    PresenceLost { key: String },
}

impl LockError {
    /// Whether the owning process must stop rather than retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LockLost { .. })
    }
}
