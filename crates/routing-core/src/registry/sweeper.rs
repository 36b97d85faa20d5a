//! Background removal of expired records.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::store::RouteStore;

/// Start the expiry sweeper.
///
/// Every `interval` the store drops records past their deadline and
/// publishes an `Expire` event for each. Runs until `shutdown` flips to
/// `true` or its sender is dropped.
pub fn start_expiry_sweeper(
    store: Arc<dyn RouteStore>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = tokio::time::sleep(interval) => {
                    if let Err(err) = store.prune_expired().await {
                        warn!(error = %err, "expiry sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("expiry sweeper shutting down");
                        break;
                    }
                }
            }
        }
    })
}
