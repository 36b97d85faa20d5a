//! Application State
//!
//! Shared by every handler: the route store and the registry limits used to
//! validate requests before they reach it.

use routing_core::RouteStore;
use routing_types::models::RegistryConfig;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub store: Arc<dyn RouteStore>,
    pub registry: RegistryConfig,
    /// Flips to `true` when the daemon shuts down; ends open event streams
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RouteStore>,
        registry: RegistryConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { inner: Arc::new(AppStateInner { store, registry, shutdown }) }
    }

    pub fn store(&self) -> &dyn RouteStore {
        self.inner.store.as_ref()
    }

    pub fn max_ttl(&self) -> u32 {
        self.inner.registry.max_ttl_secs
    }

    pub fn shutdown_rx(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.clone()
    }
}
