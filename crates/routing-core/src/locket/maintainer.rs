//! Long-running leader lock / presence maintainer.

use routing_types::models::{LockConfig, PresenceConfig};
use routing_types::LockError;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Sleep;
use tracing::{error, info, warn};

use super::client::{stop_requested, CoordinationClient};
use super::machine::{transition, Effect, LockPolicy, MaintainerState, Trigger};
use super::session::LockSession;

type AcquireSlot = Option<oneshot::Receiver<Result<(), LockError>>>;
type RetryTimer = Option<Pin<Box<Sleep>>>;

/// What woke the maintainer up.
enum Wake {
    Shutdown,
    Acquired(Result<(), LockError>),
    Lost(Result<(), LockError>),
    RetryFired,
}

/// Keeps a key held on behalf of this replica.
///
/// With [`LockPolicy::Lock`] the maintainer is the authoritative leader lock:
/// losing the key after acquisition ends [`run`](Self::run) with
/// [`LockError::LockLost`]. With [`LockPolicy::Presence`] it is an advisory
/// marker: losses are reported on the channel returned by
/// [`presence`](Self::presence) and the key is re-acquired.
#[derive(Debug)]
pub struct Maintainer {
    policy: LockPolicy,
    key: String,
    value: Vec<u8>,
    retry_interval: Duration,
    session: LockSession,
    lost_tx: Option<mpsc::UnboundedSender<LockError>>,
    state: MaintainerState,
}

impl Maintainer {
    pub fn lock(
        session: LockSession,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
        retry_interval: Duration,
    ) -> Self {
        Self::with_policy(LockPolicy::Lock, session, key.into(), value.into(), retry_interval, None)
    }

    /// Build a presence maintainer and the receiver its losses are reported on.
    pub fn presence(
        session: LockSession,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
        retry_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<LockError>) {
        let (lost_tx, lost_rx) = mpsc::unbounded_channel();
        let maintainer = Self::with_policy(
            LockPolicy::Presence,
            session,
            key.into(),
            value.into(),
            retry_interval,
            Some(lost_tx),
        );
        (maintainer, lost_rx)
    }

    /// Create the leader lock session and maintainer from configuration.
    pub async fn from_lock_config(
        client: Arc<dyn CoordinationClient>,
        config: &LockConfig,
        owner: &str,
    ) -> Result<Self, LockError> {
        let session = LockSession::create(client, config.key.clone(), config.session_ttl(), true).await?;
        Ok(Self::lock(session, config.key.clone(), owner.as_bytes(), config.retry_interval()))
    }

    /// Create the presence session and maintainer from configuration.
    pub async fn from_presence_config(
        client: Arc<dyn CoordinationClient>,
        config: &PresenceConfig,
        owner: &str,
        retry_interval: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<LockError>), LockError> {
        let session = LockSession::create(client, config.key.clone(), config.session_ttl(), false).await?;
        Ok(Self::presence(session, config.key.clone(), owner.as_bytes(), retry_interval))
    }

    fn with_policy(
        policy: LockPolicy,
        session: LockSession,
        key: String,
        value: Vec<u8>,
        retry_interval: Duration,
        lost_tx: Option<mpsc::UnboundedSender<LockError>>,
    ) -> Self {
        Self { policy, key, value, retry_interval, session, lost_tx, state: MaintainerState::Idle }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Drive the maintainer until shutdown or, for a leader lock, until the
    /// key is lost after acquisition.
    ///
    /// `ready` is completed the first time the key is acquired. On shutdown
    /// the live session is destroyed and `Ok(())` is returned.
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<bool>,
        ready: oneshot::Sender<()>,
    ) -> Result<(), LockError> {
        let mut ready = Some(ready);
        let mut acquire: AcquireSlot = None;
        let mut retry: RetryTimer = None;
        let mut pending = Some(Trigger::Start);

        loop {
            while let Some(trigger) = pending.take() {
                let step = transition(self.policy, self.state, trigger);
                self.state = step.next;

                for effect in step.effects {
                    match effect {
                        Effect::BeginAcquire => {
                            info!(key = %self.key, session = %self.session.id(), "acquiring-lock");
                            acquire = Some(self.session.spawn_acquire(&self.key, &self.value));
                        },
                        Effect::SignalReady => {
                            info!(key = %self.key, session = %self.session.id(), "acquire-lock-succeeded");
                            if let Some(tx) = ready.take() {
                                let _ = tx.send(());
                            }
                        },
                        Effect::ArmRetry => {
                            acquire = None;
                            retry = Some(Box::pin(tokio::time::sleep(self.retry_interval)));
                        },
                        Effect::Recreate => {
                            info!(key = %self.key, "retrying-acquiring-lock");
                            pending = Some(match self.session.recreate().await {
                                Ok(session) => {
                                    self.session = session;
                                    Trigger::RecreateSucceeded
                                },
                                Err(err) => {
                                    warn!(key = %self.key, error = %err, "failed to recreate session");
                                    Trigger::RecreateFailed
                                },
                            });
                        },
                        Effect::NotifyLost => {
                            warn!(key = %self.key, "lost-lock");
                            if let Some(tx) = &self.lost_tx {
                                let _ = tx.send(LockError::PresenceLost { key: self.key.clone() });
                            }
                        },
                        Effect::FailLockLost => {
                            error!(key = %self.key, session = %self.session.id(), "lost-lock");
                            self.session.destroy().await;
                            return Err(LockError::LockLost { key: self.key.clone() });
                        },
                        Effect::Release => {
                            info!(key = %self.key, session = %self.session.id(), "releasing-lock");
                            self.session.destroy().await;
                            return Ok(());
                        },
                    }
                }
            }

            let wake = tokio::select! {
                biased;
                () = stop_requested(&mut shutdown) => Wake::Shutdown,
                res = recv_acquire(&mut acquire, &self.key) => Wake::Acquired(res),
                res = self.session.loss().wait() => Wake::Lost(res),
                () = retry_elapsed(&mut retry) => Wake::RetryFired,
            };

            pending = Some(match wake {
                Wake::Shutdown => Trigger::Shutdown,
                Wake::Acquired(Ok(())) => Trigger::AcquireSucceeded,
                Wake::Acquired(Err(err)) => {
                    warn!(key = %self.key, error = %err, "acquire-lock-failed");
                    Trigger::AcquireFailed
                },
                Wake::Lost(res) => {
                    if let Err(err) = res {
                        warn!(key = %self.key, state = %self.state, error = %err, "session lost");
                    }
                    Trigger::SessionLost
                },
                Wake::RetryFired => Trigger::RetryTimerFired,
            });
        }
    }
}

/// Wait for the in-flight acquire result; pending while none is in flight.
async fn recv_acquire(slot: &mut AcquireSlot, key: &str) -> Result<(), LockError> {
    let Some(rx) = slot.as_mut() else {
        return std::future::pending().await;
    };
    let result = rx.await;
    *slot = None;
    result.unwrap_or_else(|_| {
        Err(LockError::AcquireFailed {
            key: key.to_string(),
            message: "acquire task ended without a result".to_string(),
        })
    })
}

async fn retry_elapsed(timer: &mut RetryTimer) {
    let Some(sleep) = timer.as_mut() else {
        return std::future::pending().await;
    };
    sleep.as_mut().await;
    *timer = None;
}
