//! Narrow capability interface over the coordination backend.

use async_trait::async_trait;
use routing_types::LockError;
use std::time::Duration;
use tokio::sync::watch;

/// Session and lock primitives the maintainer needs from a coordination service.
///
/// The backend guarantees that at most one live session holds a key at a
/// time. Implementations translate their own failures into [`LockError`]
/// before returning.
#[async_trait]
pub trait CoordinationClient: Send + Sync + 'static {
    /// Create a session and return its id.
    async fn create_session(
        &self,
        name: &str,
        ttl: Duration,
        with_health_checks: bool,
    ) -> Result<String, LockError>;

    /// Keep the session alive until `done` becomes `true`.
    ///
    /// Returns `Ok(())` on a requested stop and an error once the backend
    /// declares the session invalid or the client's own retries run out.
    async fn renew_periodic(
        &self,
        session_id: &str,
        ttl: Duration,
        done: watch::Receiver<bool>,
    ) -> Result<(), LockError>;

    /// Destroy the session and release every key it holds.
    async fn destroy_session(&self, session_id: &str) -> Result<(), LockError>;

    /// Block until `key` is held by `session_id` with `value` stored under it.
    async fn acquire_lock(&self, key: &str, value: &[u8], session_id: &str)
        -> Result<(), LockError>;

    /// Resolve once `key` is no longer held by `session_id`.
    async fn monitor_lock(&self, key: &str, session_id: &str) -> LockError;
}

/// Resolve when a stop flag flips to `true`; a dropped sender never resolves.
pub(crate) async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    let signalled = rx.wait_for(|stop| *stop).await.is_ok();
    if !signalled {
        std::future::pending::<()>().await;
    }
}
