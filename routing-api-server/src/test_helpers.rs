//! Test helpers for routing-api-server unit tests.

use std::sync::Arc;

use axum_test::TestServer;
use routing_core::MemoryRouteStore;
use routing_types::models::RegistryConfig;
use tokio::sync::watch;

use crate::router::build_router;
use crate::state::AppState;

/// In-memory app wired the way `main` wires it.
///
/// Keep `shutdown` alive for the test duration; flipping it ends open event
/// streams.
pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<MemoryRouteStore>,
    pub shutdown: watch::Sender<bool>,
}

pub fn test_app() -> TestApp {
    let store = Arc::new(MemoryRouteStore::new(RegistryConfig::default()));
    let (shutdown, shutdown_rx) = watch::channel(false);
    let state = AppState::new(store.clone(), RegistryConfig::default(), shutdown_rx);
    let server = TestServer::new(build_router(state)).expect("failed to start test server");
    TestApp { server, store, shutdown }
}
