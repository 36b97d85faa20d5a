//! Route store interface and watch handles.

use async_trait::async_trait;
use routing_types::{RegistryError, Route, StoreEvent, TcpRouteMapping, WatchFilter};
use tokio::sync::mpsc;

/// TTL-governed registry of HTTP routes and TCP route mappings.
///
/// Saves are upserts keyed by the record's natural key: last write wins, the
/// modification tag index is bumped on every save and the expiry deadline is
/// recomputed from the record's TTL. Reads only return records whose
/// deadline is still in the future.
#[async_trait]
pub trait RouteStore: Send + Sync + 'static {
    async fn save_route(&self, route: Route) -> Result<Route, RegistryError>;

    async fn save_tcp_route_mapping(
        &self,
        mapping: TcpRouteMapping,
    ) -> Result<TcpRouteMapping, RegistryError>;

    /// Delete by natural key; [`RegistryError::NotFound`] if absent.
    async fn delete_route(&self, route: &Route) -> Result<(), RegistryError>;

    /// Delete by natural key; [`RegistryError::NotFound`] if absent.
    async fn delete_tcp_route_mapping(&self, mapping: &TcpRouteMapping) -> Result<(), RegistryError>;

    async fn read_routes(&self) -> Result<Vec<Route>, RegistryError>;

    async fn read_tcp_route_mappings(&self) -> Result<Vec<TcpRouteMapping>, RegistryError>;

    /// Subscribe to changes for one record family.
    fn watch_changes(&self, filter: WatchFilter) -> WatchHandle;

    /// Remove records past their deadline, publishing an `Expire` event for each.
    async fn prune_expired(&self) -> Result<usize, RegistryError>;
}

/// Releases a store-side watch; runs its release action at most once.
///
/// Dropping the handle cancels too, so a subscriber that disappears
/// mid-stream never leaks its watch.
pub struct WatchCancel(Option<Box<dyn FnOnce() + Send>>);

impl WatchCancel {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(release)))
    }

    pub fn cancel(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_none()
    }
}

impl Drop for WatchCancel {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for WatchCancel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WatchCancel").field(&self.is_cancelled()).finish()
    }
}

/// One subscription to a store's change feed.
#[derive(Debug)]
pub struct WatchHandle {
    pub events: mpsc::Receiver<StoreEvent>,
    /// At most one terminal error; the events channel closes after it
    pub errors: mpsc::Receiver<RegistryError>,
    cancel: WatchCancel,
}

impl WatchHandle {
    pub fn new(
        events: mpsc::Receiver<StoreEvent>,
        errors: mpsc::Receiver<RegistryError>,
        cancel: WatchCancel,
    ) -> Self {
        Self { events, errors, cancel }
    }

    /// Release the store-side subscription. Idempotent.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
