//! Coordination session with background renewal and one-shot loss reporting.

use parking_lot::Mutex;
use routing_types::LockError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

use super::client::{stop_requested, CoordinationClient};

/// Outcome delivered through a [`LossSignal`]: `None` on clean shutdown.
type LossOutcome = Option<LockError>;

/// Yields at most one session outcome, then stays pending forever.
///
/// `Ok(())` means the session was shut down on purpose; `Err` carries the
/// reason the backend invalidated it. The wait is cancel-safe, so it can sit
/// in a `select!` loop.
#[derive(Debug)]
pub struct LossSignal {
    rx: Option<oneshot::Receiver<LossOutcome>>,
}

impl LossSignal {
    fn new(rx: oneshot::Receiver<LossOutcome>) -> Self {
        Self { rx: Some(rx) }
    }

    fn spent() -> Self {
        Self { rx: None }
    }

    /// Wait for the session outcome.
    pub async fn wait(&mut self) -> Result<(), LockError> {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        let outcome = rx.await;
        self.rx = None;
        match outcome {
            Ok(Some(err)) => Err(err),
            Ok(None) | Err(_) => Ok(()),
        }
    }

    /// Whether the single outcome has already been consumed.
    pub fn is_spent(&self) -> bool {
        self.rx.is_none()
    }
}

struct SessionShared {
    id: String,
    destroyed: AtomicBool,
    loss_tx: Mutex<Option<oneshot::Sender<LossOutcome>>>,
    stop_tx: watch::Sender<bool>,
}

impl SessionShared {
    /// Deliver the session outcome; only the first call has any effect.
    fn report(&self, outcome: LossOutcome) -> bool {
        match self.loss_tx.lock().take() {
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            },
            None => false,
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// A live coordination session.
///
/// Renewal runs in the background from creation until [`destroy`](Self::destroy).
/// Owned by exactly one maintainer; ownership moves to a fresh session
/// through [`recreate`](Self::recreate).
pub struct LockSession {
    client: Arc<dyn CoordinationClient>,
    name: String,
    ttl: Duration,
    with_health_checks: bool,
    shared: Arc<SessionShared>,
    loss: LossSignal,
}

impl std::fmt::Debug for LockSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockSession")
            .field("id", &self.shared.id)
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("destroyed", &self.shared.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl LockSession {
    /// Create a session and start renewing it every half TTL.
    pub async fn create(
        client: Arc<dyn CoordinationClient>,
        name: impl Into<String>,
        ttl: Duration,
        with_health_checks: bool,
    ) -> Result<Self, LockError> {
        let name = name.into();
        let id = client.create_session(&name, ttl, with_health_checks).await?;

        let (loss_tx, loss_rx) = oneshot::channel();
        let (stop_tx, _) = watch::channel(false);
        let shared = Arc::new(SessionShared {
            id,
            destroyed: AtomicBool::new(false),
            loss_tx: Mutex::new(Some(loss_tx)),
            stop_tx,
        });

        let renew_client = Arc::clone(&client);
        let renew_shared = Arc::clone(&shared);
        let done = shared.stop_tx.subscribe();
        tokio::spawn(async move {
            if let Err(err) = renew_client.renew_periodic(&renew_shared.id, ttl, done).await {
                if !renew_shared.is_destroyed() {
                    warn!(session = %renew_shared.id, error = %err, "session renewal failed");
                    renew_shared.report(Some(err));
                }
            }
        });

        debug!(session = %shared.id, name = %name, ttl_secs = ttl.as_secs(), "session created");

        Ok(Self { client, name, ttl, with_health_checks, shared, loss: LossSignal::new(loss_rx) })
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.is_destroyed()
    }

    /// The session's loss signal.
    pub fn loss(&mut self) -> &mut LossSignal {
        &mut self.loss
    }

    /// Move the loss signal out, leaving a spent one behind.
    pub fn take_loss(&mut self) -> LossSignal {
        std::mem::replace(&mut self.loss, LossSignal::spent())
    }

    /// Start acquiring `key` on a background task.
    ///
    /// The receiver yields the acquire result. Once acquired, the key is
    /// monitored and losing it is reported through the loss signal. A
    /// destroyed session drops the sender without a result.
    pub fn spawn_acquire(&self, key: &str, value: &[u8]) -> oneshot::Receiver<Result<(), LockError>> {
        let (result_tx, result_rx) = oneshot::channel();
        let client = Arc::clone(&self.client);
        let shared = Arc::clone(&self.shared);
        let key = key.to_string();
        let value = value.to_vec();
        let mut stop = shared.stop_tx.subscribe();

        tokio::spawn(async move {
            let acquired = tokio::select! {
                biased;
                () = stop_requested(&mut stop) => return,
                res = client.acquire_lock(&key, &value, &shared.id) => res,
            };
            let held = acquired.is_ok();
            if result_tx.send(acquired).is_err() || !held {
                return;
            }

            tokio::select! {
                biased;
                () = stop_requested(&mut stop) => {},
                err = client.monitor_lock(&key, &shared.id) => {
                    if !shared.is_destroyed() {
                        warn!(session = %shared.id, key = %key, error = %err, "lock no longer held");
                        shared.report(Some(err));
                    }
                },
            }
        });

        result_rx
    }

    /// Stop renewal and destroy the backend session.
    ///
    /// Safe to call repeatedly and concurrently; only the first call does any
    /// work. Reports a clean shutdown on the loss signal if nothing was
    /// reported yet. Backend failures are logged, never returned.
    pub async fn destroy(&self) {
        if self.shared.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.stop_tx.send_replace(true);
        self.shared.report(None);

        match self.client.destroy_session(&self.shared.id).await {
            Ok(()) => debug!(session = %self.shared.id, "session destroyed"),
            Err(err) => warn!(session = %self.shared.id, error = %err, "failed to destroy session"),
        }
    }

    /// Destroy this session (best effort) and create a fresh one with the same settings.
    pub async fn recreate(&self) -> Result<LockSession, LockError> {
        self.destroy().await;
        LockSession::create(Arc::clone(&self.client), self.name.clone(), self.ttl, self.with_health_checks)
            .await
    }
}

impl Drop for LockSession {
    fn drop(&mut self) {
        if self.shared.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.stop_tx.send_replace(true);
        self.shared.report(None);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let client = Arc::clone(&self.client);
        let id = self.shared.id.clone();
        runtime.spawn(async move {
            if let Err(err) = client.destroy_session(&id).await {
                warn!(session = %id, error = %err, "failed to destroy dropped session");
            }
        });
    }
}
