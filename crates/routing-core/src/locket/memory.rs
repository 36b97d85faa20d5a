//! In-process coordination backend.
//!
//! Serves single-replica development setups and doubles as the injectable
//! backend in tests. The administrative hooks (`release_key`,
//! `invalidate_session`) simulate operator action and backend-side expiry;
//! `fail_next_creates` / `fail_next_acquires` simulate a flaky backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use routing_types::LockError;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use super::client::{stop_requested, CoordinationClient};

#[derive(Debug, Clone)]
struct SessionEntry {
    name: String,
    with_health_checks: bool,
}

#[derive(Debug, Clone)]
struct LockEntry {
    session_id: String,
    value: Vec<u8>,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    sessions: HashMap<String, SessionEntry>,
    locks: HashMap<String, LockEntry>,
    sessions_created: u64,
    failing_creates: u32,
    failing_acquires: u32,
}

/// Coordination backend held entirely in memory.
#[derive(Debug)]
pub struct MemoryCoordinator {
    state: Mutex<CoordinatorState>,
    /// Bumped on every mutation so blocked waiters re-check state.
    changes: watch::Sender<u64>,
}

impl Default for MemoryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCoordinator {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self { state: Mutex::new(CoordinatorState::default()), changes }
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    /// Current holder of `key` as `(session_id, value)`.
    pub fn holder(&self, key: &str) -> Option<(String, Vec<u8>)> {
        self.state.lock().locks.get(key).map(|entry| (entry.session_id.clone(), entry.value.clone()))
    }

    /// Value stored under `key`, decoded as UTF-8.
    pub fn holder_value(&self, key: &str) -> Option<String> {
        self.holder(key).map(|(_, value)| String::from_utf8_lossy(&value).into_owned())
    }

    /// Forcibly release `key`, as an operator or a competing tool would.
    pub fn release_key(&self, key: &str) -> bool {
        let released = self.state.lock().locks.remove(key).is_some();
        if released {
            debug!(key = %key, "key released externally");
            self.notify();
        }
        released
    }

    /// Invalidate a session as if its TTL lapsed on the backend.
    pub fn invalidate_session(&self, session_id: &str) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.sessions.remove(session_id).is_some();
            state.locks.retain(|_, entry| entry.session_id != session_id);
            removed
        };
        if removed {
            debug!(session = %session_id, "session invalidated externally");
            self.notify();
        }
        removed
    }

    /// Make the next `n` `create_session` calls fail.
    pub fn fail_next_creates(&self, n: u32) {
        self.state.lock().failing_creates = n;
    }

    /// Make the next `n` `acquire_lock` calls fail before touching the key.
    pub fn fail_next_acquires(&self, n: u32) {
        self.state.lock().failing_acquires = n;
    }

    pub fn live_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn sessions_created(&self) -> u64 {
        self.state.lock().sessions_created
    }

    pub fn session_has_health_checks(&self, session_id: &str) -> Option<bool> {
        self.state.lock().sessions.get(session_id).map(|entry| entry.with_health_checks)
    }
}

#[async_trait]
impl CoordinationClient for MemoryCoordinator {
    async fn create_session(
        &self,
        name: &str,
        _ttl: Duration,
        with_health_checks: bool,
    ) -> Result<String, LockError> {
        let id = uuid::Uuid::new_v4().to_string();
        {
            let mut state = self.state.lock();
            if state.failing_creates > 0 {
                state.failing_creates -= 1;
                return Err(LockError::SessionCreate {
                    name: name.to_string(),
                    message: "backend unavailable".to_string(),
                });
            }
            state.sessions.insert(
                id.clone(),
                SessionEntry { name: name.to_string(), with_health_checks },
            );
            state.sessions_created += 1;
        }
        self.notify();
        Ok(id)
    }

    async fn renew_periodic(
        &self,
        session_id: &str,
        _ttl: Duration,
        mut done: watch::Receiver<bool>,
    ) -> Result<(), LockError> {
        let mut changes = self.changes.subscribe();
        loop {
            if !self.state.lock().sessions.contains_key(session_id) {
                return Err(LockError::SessionInvalid { session_id: session_id.to_string() });
            }
            tokio::select! {
                biased;
                () = stop_requested(&mut done) => return Ok(()),
                changed = changes.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn destroy_session(&self, session_id: &str) -> Result<(), LockError> {
        {
            let mut state = self.state.lock();
            if let Some(entry) = state.sessions.remove(session_id) {
                debug!(session = %session_id, name = %entry.name, "session removed");
            }
            state.locks.retain(|_, entry| entry.session_id != session_id);
        }
        self.notify();
        Ok(())
    }

    async fn acquire_lock(
        &self,
        key: &str,
        value: &[u8],
        session_id: &str,
    ) -> Result<(), LockError> {
        {
            let mut state = self.state.lock();
            if state.failing_acquires > 0 {
                state.failing_acquires -= 1;
                return Err(LockError::AcquireFailed {
                    key: key.to_string(),
                    message: "backend unavailable".to_string(),
                });
            }
        }

        let mut changes = self.changes.subscribe();
        loop {
            let acquired = {
                let mut state = self.state.lock();
                if !state.sessions.contains_key(session_id) {
                    return Err(LockError::SessionInvalid { session_id: session_id.to_string() });
                }
                match state.locks.get(key) {
                    Some(entry) => entry.session_id == session_id,
                    None => {
                        state.locks.insert(
                            key.to_string(),
                            LockEntry { session_id: session_id.to_string(), value: value.to_vec() },
                        );
                        true
                    },
                }
            };
            if acquired {
                self.notify();
                return Ok(());
            }
            if changes.changed().await.is_err() {
                return Err(LockError::Backend { message: "coordinator shut down".to_string() });
            }
        }
    }

    async fn monitor_lock(&self, key: &str, session_id: &str) -> LockError {
        let mut changes = self.changes.subscribe();
        loop {
            let held = self
                .state
                .lock()
                .locks
                .get(key)
                .is_some_and(|entry| entry.session_id == session_id);
            if !held {
                return LockError::LockLost { key: key.to_string() };
            }
            if changes.changed().await.is_err() {
                return LockError::LockLost { key: key.to_string() };
            }
        }
    }
}
