//! Leader lock and presence tasks for this replica.

use routing_core::{CoordinationClient, Maintainer};
use routing_types::{LockError, ServerConfig};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub type MaintainerTask = JoinHandle<Result<(), LockError>>;

pub struct Leadership {
    /// Completes once this replica holds the leader lock
    pub ready: oneshot::Receiver<()>,
    pub lock_task: MaintainerTask,
    pub presence_task: Option<MaintainerTask>,
}

/// Start the presence marker (if configured) and the leader lock.
pub async fn start(
    client: Arc<dyn CoordinationClient>,
    config: &ServerConfig,
    owner: &str,
    shutdown: watch::Receiver<bool>,
) -> Result<Leadership, LockError> {
    let presence_task = match &config.presence {
        Some(presence) => {
            let (maintainer, mut lost) = Maintainer::from_presence_config(
                Arc::clone(&client),
                presence,
                owner,
                config.lock.retry_interval(),
            )
            .await?;
            let (ready_tx, ready_rx) = oneshot::channel();
            let key = presence.key.clone();

            tokio::spawn(async move {
                if ready_rx.await.is_ok() {
                    info!(key = %key, "Presence registered");
                }
                while let Some(err) = lost.recv().await {
                    warn!(key = %key, error = %err, "Presence lost, re-registering");
                }
            });
            Some(tokio::spawn(maintainer.run(shutdown.clone(), ready_tx)))
        },
        None => None,
    };

    let lock = Maintainer::from_lock_config(client, &config.lock, owner).await?;
    let (ready_tx, ready) = oneshot::channel();
    let lock_task = tokio::spawn(lock.run(shutdown, ready_tx));

    Ok(Leadership { ready, lock_task, presence_task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use routing_core::MemoryCoordinator;
    use routing_types::models::PresenceConfig;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_lock_and_presence_acquired_then_released() {
        let coordinator = Arc::new(MemoryCoordinator::new());
        let client: Arc<dyn CoordinationClient> = coordinator.clone();
        let config = ServerConfig {
            presence: Some(PresenceConfig { key: "routing_api_presence".to_string(), session_ttl_secs: 5 }),
            ..Default::default()
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let leadership = start(client, &config, "node-a", shutdown_rx).await.unwrap();
        timeout(Duration::from_secs(1), leadership.ready).await.unwrap().unwrap();
        assert_eq!(coordinator.holder_value("routing_api_lock").as_deref(), Some("node-a"));

        timeout(Duration::from_secs(1), async {
            while coordinator.holder_value("routing_api_presence").is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown_tx.send_replace(true);
        assert_eq!(leadership.lock_task.await.unwrap(), Ok(()));
        assert_eq!(leadership.presence_task.unwrap().await.unwrap(), Ok(()));
        assert_eq!(coordinator.live_sessions(), 0);
    }
}
