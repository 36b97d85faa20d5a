//! In-process change feed shared by every store implementation.

use routing_types::{RegistryError, StoreEvent, WatchFilter};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use super::store::{WatchCancel, WatchHandle};

/// Per-filter broadcast of store events.
///
/// Each watch gets its own forwarding task, so a slow subscriber only ever
/// cuts itself off (with [`RegistryError::Lagged`]) and never stalls
/// publishers or other subscribers.
#[derive(Debug)]
pub struct EventHub {
    http: broadcast::Sender<StoreEvent>,
    tcp: broadcast::Sender<StoreEvent>,
}

impl EventHub {
    pub fn new(buffer: usize) -> Self {
        let (http, _) = broadcast::channel(buffer.max(1));
        let (tcp, _) = broadcast::channel(buffer.max(1));
        Self { http, tcp }
    }

    fn sender(&self, filter: WatchFilter) -> &broadcast::Sender<StoreEvent> {
        match filter {
            WatchFilter::HttpRoutes => &self.http,
            WatchFilter::TcpRoutes => &self.tcp,
        }
    }

    /// Publish an event; returns how many watches it reached.
    pub fn publish(&self, filter: WatchFilter, event: StoreEvent) -> usize {
        self.sender(filter).send(event).unwrap_or(0)
    }

    /// Number of live watches on `filter`.
    pub fn watcher_count(&self, filter: WatchFilter) -> usize {
        self.sender(filter).receiver_count()
    }

    /// Open a watch. Events published after this call are delivered in order.
    pub fn subscribe(&self, filter: WatchFilter) -> WatchHandle {
        let mut feed = self.sender(filter).subscribe();
        let (event_tx, event_rx) = mpsc::channel(1);
        let (error_tx, error_rx) = mpsc::channel(1);
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = &mut cancel_rx => break,
                    received = feed.recv() => received,
                };

                match event {
                    Ok(event) => {
                        let delivered = tokio::select! {
                            biased;
                            _ = &mut cancel_rx => false,
                            sent = event_tx.send(event) => sent.is_ok(),
                        };
                        if !delivered {
                            break;
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(%filter, skipped, "watch fell behind the change feed");
                        let _ = error_tx.send(RegistryError::Lagged { skipped }).await;
                        break;
                    },
                    Err(RecvError::Closed) => {
                        let _ = error_tx.send(RegistryError::WatchClosed).await;
                        break;
                    },
                }
            }
            debug!(%filter, "watch released");
        });

        WatchHandle::new(
            event_rx,
            error_rx,
            WatchCancel::new(move || {
                let _ = cancel_tx.send(());
            }),
        )
    }
}
