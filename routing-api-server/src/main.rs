//! Routing API Server - Headless Daemon
//!
//! A route registry daemon that:
//! - Contends for the leader lock and only serves while holding it
//! - Stores HTTP routes and TCP route mappings with TTL-based expiry
//! - Streams registry changes to subscribers as server-sent events
//!
//! API under /routing/v1, liveness on /health.

use anyhow::Result;
use clap::Parser;
use routing_core::start_expiry_sweeper;
use routing_types::{LockError, ServerConfig};
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{error, info};

mod api;
mod backend;
mod cli;
mod config;
mod leadership;
mod logging;
mod router;
mod server_utils;
mod state;

#[cfg(test)]
mod test_helpers;

use backend::Backends;
use cli::Cli;
use leadership::{Leadership, MaintainerTask};
use state::AppState;

type LockOutcome = Result<Result<(), LockError>, JoinError>;

enum Exit {
    Server(Result<std::io::Result<()>, JoinError>),
    Lock(LockOutcome),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level)?;

    let config = config::resolve(&cli)?;
    let owner = config.lock.owner_value.clone().unwrap_or_else(server_utils::get_instance_id);
    info!(owner = %owner, version = env!("CARGO_PKG_VERSION"), "🚀 Routing API starting");

    let backends = Backends::connect(&config).await?;

    let (shutdown_tx, _) = watch::channel(false);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        server_utils::shutdown_signal().await;
        signal_tx.send_replace(true);
    });

    run(config, &owner, backends, shutdown_tx).await?;

    info!("👋 Routing API stopped");
    Ok(())
}

/// Contend for the leader lock and serve the API for as long as it is held.
///
/// Returns once `shutdown_tx` flips or the lock is lost. Whatever ends the
/// run, the lock maintainer is stopped and joined before returning, so the
/// key is released while the runtime is still up.
async fn run(
    config: ServerConfig,
    owner: &str,
    backends: Backends,
    shutdown_tx: watch::Sender<bool>,
) -> Result<()> {
    let shutdown_rx = shutdown_tx.subscribe();
    let Leadership { ready, mut lock_task, presence_task } =
        leadership::start(backends.coordinator.clone(), &config, owner, shutdown_rx.clone()).await?;

    info!(key = %config.lock.key, "Waiting for the leader lock");
    if ready.await.is_err() {
        // The maintainer ended without acquiring: shutdown arrived first.
        let locked = lock_task.await;
        join_presence(presence_task).await;
        report_lock_exit(&locked);
        locked??;
        return Ok(());
    }
    info!(key = %config.lock.key, "✅ Leader lock acquired");

    let sweeper = start_expiry_sweeper(
        backends.store.clone(),
        config.registry.expiry_sweep_interval(),
        shutdown_rx.clone(),
    );

    let listener = match server_utils::create_listener(&config) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, "Failed to open the API listener, releasing the leader lock");
            shutdown_tx.send_replace(true);
            let _ = sweeper.await;
            report_lock_exit(&lock_task.await);
            join_presence(presence_task).await;
            return Err(err);
        },
    };

    let state = AppState::new(backends.store.clone(), config.registry, shutdown_rx.clone());
    let app = router::build_router(state);
    info!("🌐 Serving /routing/v1");

    let mut server_shutdown = shutdown_rx;
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stop| *stop).await;
            })
            .await
    });

    let exit = tokio::select! {
        served = &mut server => Exit::Server(served),
        locked = &mut lock_task => Exit::Lock(locked),
    };

    // Whatever ended first, stop everything else.
    shutdown_tx.send_replace(true);
    let (served, locked) = match exit {
        Exit::Server(served) => (served, lock_task.await),
        Exit::Lock(locked) => (server.await, locked),
    };
    let _ = sweeper.await;
    join_presence(presence_task).await;

    report_lock_exit(&locked);
    locked??;
    served??;
    Ok(())
}

fn report_lock_exit(locked: &LockOutcome) {
    match locked {
        Ok(Ok(())) => {},
        Ok(Err(err)) if err.is_fatal() => error!(error = %err, "Leader lock lost, exiting"),
        Ok(Err(err)) => error!(error = %err, "Leader lock maintainer failed"),
        Err(err) => error!(error = %err, "Leader lock maintainer panicked"),
    }
}

async fn join_presence(task: Option<MaintainerTask>) {
    let Some(task) = task else {
        return;
    };
    match task.await {
        Ok(Ok(())) => {},
        Ok(Err(err)) => error!(error = %err, "Presence maintainer failed"),
        Err(err) => error!(error = %err, "Presence maintainer panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routing_core::{MemoryCoordinator, MemoryRouteStore};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn memory_backends(config: &ServerConfig) -> (Arc<MemoryCoordinator>, Backends) {
        let coordinator = Arc::new(MemoryCoordinator::new());
        let backends = Backends {
            coordinator: coordinator.clone(),
            store: Arc::new(MemoryRouteStore::new(config.registry)),
        };
        (coordinator, backends)
    }

    #[tokio::test]
    async fn test_listener_failure_releases_leader_lock() {
        let config = ServerConfig { bind_address: "not-an-ip".to_string(), ..Default::default() };
        let key = config.lock.key.clone();
        let (coordinator, backends) = memory_backends(&config);
        let (shutdown_tx, _) = watch::channel(false);

        let result = timeout(Duration::from_secs(5), run(config, "node-a", backends, shutdown_tx))
            .await
            .unwrap();

        assert!(result.is_err());
        assert!(coordinator.holder(&key).is_none());
        assert_eq!(coordinator.live_sessions(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_releases_lock_and_returns_ok() {
        let config = ServerConfig { port: 0, ..Default::default() };
        let key = config.lock.key.clone();
        let (coordinator, backends) = memory_backends(&config);
        let (shutdown_tx, _) = watch::channel(false);

        let daemon = tokio::spawn(run(config, "node-a", backends, shutdown_tx.clone()));
        wait_until(|| coordinator.holder_value(&key).as_deref() == Some("node-a")).await;

        shutdown_tx.send_replace(true);
        timeout(Duration::from_secs(5), daemon).await.unwrap().unwrap().unwrap();
        assert_eq!(coordinator.live_sessions(), 0);
    }

    #[tokio::test]
    async fn test_lost_lock_ends_run_with_lock_lost() {
        let config = ServerConfig { port: 0, ..Default::default() };
        let key = config.lock.key.clone();
        let (coordinator, backends) = memory_backends(&config);
        let (shutdown_tx, _) = watch::channel(false);

        let daemon = tokio::spawn(run(config, "node-a", backends, shutdown_tx));
        wait_until(|| coordinator.holder(&key).is_some()).await;

        assert!(coordinator.release_key(&key));
        let err = timeout(Duration::from_secs(5), daemon).await.unwrap().unwrap().unwrap_err();
        assert!(matches!(err.downcast_ref::<LockError>(), Some(LockError::LockLost { .. })), "got {err}");
    }

    async fn wait_until(check: impl Fn() -> bool) {
        timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}
