//! PostgreSQL pool construction and error mapping.

use routing_types::{LockError, RegistryError};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Connect a pool sized for one daemon: a few lock/renewal queries plus
/// request-driven registry traffic.
pub async fn connect_pool(database_url: &str) -> Result<PgPool, RegistryError> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(300))
        .connect(database_url)
        .await
        .map_err(map_sqlx_err)
}

pub(crate) fn map_sqlx_err(err: sqlx::Error) -> RegistryError {
    match err {
        sqlx::Error::RowNotFound => RegistryError::NotFound { key: "row".to_string() },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            RegistryError::Serialization { message: err.to_string() }
        },
        other => RegistryError::Database { message: other.to_string() },
    }
}

pub(crate) fn map_lock_err(err: &sqlx::Error) -> LockError {
    LockError::Backend { message: err.to_string() }
}
