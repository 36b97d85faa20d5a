//! Backend selection: PostgreSQL when a database URL is configured,
//! in-process otherwise.

use routing_core::db::connect_pool;
use routing_core::{
    CoordinationClient, MemoryCoordinator, MemoryRouteStore, PgCoordinator, PgRouteStore,
    RouteStore,
};
use routing_types::models::RegistryConfig;
use routing_types::{Result, ServerConfig};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Backends {
    pub coordinator: Arc<dyn CoordinationClient>,
    pub store: Arc<dyn RouteStore>,
}

impl Backends {
    /// Connect to and prepare the configured backends. Lock and registry
    /// failures both surface as [`routing_types::TypedError`].
    pub async fn connect(config: &ServerConfig) -> Result<Self> {
        let Some(url) = &config.database_url else {
            warn!("No database_url configured; leadership and routes are local to this process");
            return Ok(Self::in_memory(config.registry));
        };

        let pool = connect_pool(url).await?;

        let coordinator = PgCoordinator::new(pool.clone(), config.lock.poll_interval());
        coordinator.ensure_schema().await?;

        let store = PgRouteStore::new(pool, config.registry);
        store.ensure_schema().await?;

        info!("Using PostgreSQL coordination and route store");
        Ok(Self { coordinator: Arc::new(coordinator), store: Arc::new(store) })
    }

    pub fn in_memory(registry: RegistryConfig) -> Self {
        Self {
            coordinator: Arc::new(MemoryCoordinator::new()),
            store: Arc::new(MemoryRouteStore::new(registry)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routing_types::{RegistryError, TypedError};

    #[tokio::test]
    async fn test_no_database_url_uses_memory_backends() {
        let backends = Backends::connect(&ServerConfig::default()).await.unwrap();
        assert!(backends.store.read_routes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_database_url_is_registry_error() {
        let config = ServerConfig {
            database_url: Some("not a database url".to_string()),
            ..Default::default()
        };

        let err = Backends::connect(&config).await.err().unwrap();
        assert!(matches!(err, TypedError::Registry(RegistryError::Database { .. })), "got {err}");
    }
}
