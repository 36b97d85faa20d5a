//! PostgreSQL route store.
//!
//! Each record family lives in its own table keyed by the JSON encoding of
//! its natural key. Change notifications go through the in-process
//! [`EventHub`], so only watchers connected to this replica (the leader) see
//! them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use routing_types::models::RegistryConfig;
use routing_types::{EventType, RegistryError, Route, StoreEvent, TcpRouteMapping, WatchFilter};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::sync::Arc;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::hub::EventHub;
use super::record::{prepare_upsert, StoredRecord};
use super::store::{RouteStore, WatchHandle};
use crate::db::map_sqlx_err;

pub struct PgRouteStore {
    pool: PgPool,
    hub: EventHub,
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
}

fn decode<R: StoredRecord>(row: &PgRow) -> Result<R, RegistryError> {
    row.try_get::<Json<R>, _>("payload").map(|Json(record)| record).map_err(map_sqlx_err)
}

impl PgRouteStore {
    pub fn new(pool: PgPool, config: RegistryConfig) -> Self {
        Self::with_clock(pool, config, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self { pool, hub: EventHub::new(config.watch_buffer), config, clock }
    }

    /// Create the route tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), RegistryError> {
        for table in [Route::TABLE, TcpRouteMapping::TABLE] {
            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    record_key TEXT PRIMARY KEY,
                    payload JSONB NOT NULL,
                    expires_at TIMESTAMPTZ NOT NULL
                )"
            );
            sqlx::query(&ddl).execute(&self.pool).await.map_err(map_sqlx_err)?;

            let index = format!("CREATE INDEX IF NOT EXISTS {table}_expires_at ON {table} (expires_at)");
            sqlx::query(&index).execute(&self.pool).await.map_err(map_sqlx_err)?;
        }
        Ok(())
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    async fn upsert<R: StoredRecord>(&self, incoming: R) -> Result<R, RegistryError> {
        incoming.validate(self.config.max_ttl_secs)?;
        let now = self.clock.now();
        let record_key = serde_json::to_string(&incoming.key())?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let select = format!(
            "SELECT payload FROM {} WHERE record_key = $1 AND expires_at > $2 FOR UPDATE",
            R::TABLE
        );
        let existing = sqlx::query(&select)
            .bind(&record_key)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        let previous = existing.as_ref().map(decode::<R>).transpose()?.map(|r| r.tag().clone());
        let event_type = if previous.is_some() { EventType::Update } else { EventType::Create };

        let stored = prepare_upsert(incoming, previous.as_ref(), now, self.config.max_ttl_secs)?;
        let expires_at = stored.expires_at().unwrap_or(now);

        let upsert = format!(
            "INSERT INTO {} (record_key, payload, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT (record_key) DO UPDATE
                 SET payload = EXCLUDED.payload, expires_at = EXCLUDED.expires_at",
            R::TABLE
        );
        sqlx::query(&upsert)
            .bind(&record_key)
            .bind(Json(&stored))
            .bind(expires_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        tx.commit().await.map_err(map_sqlx_err)?;

        self.hub.publish(R::FILTER, StoreEvent::new(event_type, serde_json::to_string(&stored)?));
        Ok(stored)
    }

    async fn delete<R: StoredRecord>(&self, record: &R) -> Result<(), RegistryError> {
        let key = record.key();
        let record_key = serde_json::to_string(&key)?;
        let sql = format!(
            "DELETE FROM {} WHERE record_key = $1 AND expires_at > $2 RETURNING payload",
            R::TABLE
        );
        let row = sqlx::query(&sql)
            .bind(&record_key)
            .bind(self.clock.now())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?
            .ok_or_else(|| RegistryError::NotFound { key: key.to_string() })?;

        let removed: R = decode(&row)?;
        self.hub.publish(R::FILTER, StoreEvent::new(EventType::Delete, serde_json::to_string(&removed)?));
        Ok(())
    }

    async fn read<R: StoredRecord>(&self) -> Result<Vec<R>, RegistryError> {
        let sql = format!("SELECT payload FROM {} WHERE expires_at > $1 ORDER BY record_key", R::TABLE);
        let rows = sqlx::query(&sql).bind(self.clock.now()).fetch_all(&self.pool).await.map_err(map_sqlx_err)?;
        rows.iter().map(decode::<R>).collect()
    }

    async fn prune<R: StoredRecord>(&self, now: DateTime<Utc>) -> Result<usize, RegistryError> {
        let sql = format!("DELETE FROM {} WHERE expires_at <= $1 RETURNING payload", R::TABLE);
        let rows = sqlx::query(&sql).bind(now).fetch_all(&self.pool).await.map_err(map_sqlx_err)?;
        for row in &rows {
            let expired: R = decode(row)?;
            self.hub.publish(R::FILTER, StoreEvent::new(EventType::Expire, serde_json::to_string(&expired)?));
        }
        Ok(rows.len())
    }
}

#[async_trait]
impl RouteStore for PgRouteStore {
    async fn save_route(&self, route: Route) -> Result<Route, RegistryError> {
        self.upsert(route).await
    }

    async fn save_tcp_route_mapping(
        &self,
        mapping: TcpRouteMapping,
    ) -> Result<TcpRouteMapping, RegistryError> {
        self.upsert(mapping).await
    }

    async fn delete_route(&self, route: &Route) -> Result<(), RegistryError> {
        self.delete(route).await
    }

    async fn delete_tcp_route_mapping(&self, mapping: &TcpRouteMapping) -> Result<(), RegistryError> {
        self.delete(mapping).await
    }

    async fn read_routes(&self) -> Result<Vec<Route>, RegistryError> {
        self.read().await
    }

    async fn read_tcp_route_mappings(&self) -> Result<Vec<TcpRouteMapping>, RegistryError> {
        self.read().await
    }

    fn watch_changes(&self, filter: WatchFilter) -> WatchHandle {
        self.hub.subscribe(filter)
    }

    async fn prune_expired(&self) -> Result<usize, RegistryError> {
        let now = self.clock.now();
        let pruned = self.prune::<Route>(now).await? + self.prune::<TcpRouteMapping>(now).await?;
        if pruned > 0 {
            debug!(pruned, "expired records removed");
        }
        Ok(pruned)
    }
}
