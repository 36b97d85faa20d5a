//! In-memory route store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use routing_types::models::RegistryConfig;
use routing_types::{
    EventType, RegistryError, Route, StoreEvent, TcpRouteMapping, WatchFilter,
};
use std::sync::Arc;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::hub::EventHub;
use super::record::{prepare_upsert, StoredRecord};
use super::store::{RouteStore, WatchHandle};

/// One record family keyed by natural key.
///
/// Events are published while the entry's shard lock is held, so watchers
/// see changes to a key in the order they were applied.
struct RecordTable<R: StoredRecord> {
    records: DashMap<R::Key, R>,
}

impl<R: StoredRecord> RecordTable<R> {
    fn new() -> Self {
        Self { records: DashMap::new() }
    }

    fn upsert(
        &self,
        incoming: R,
        now: DateTime<Utc>,
        max_ttl: u32,
        hub: &EventHub,
    ) -> Result<R, RegistryError> {
        match self.records.entry(incoming.key()) {
            Entry::Occupied(mut entry) => {
                // An expired record that has not been swept yet counts as absent.
                let previous = entry.get().is_live(now).then(|| entry.get().tag().clone());
                let event_type = if previous.is_some() { EventType::Update } else { EventType::Create };
                let stored = prepare_upsert(incoming, previous.as_ref(), now, max_ttl)?;
                let payload = serde_json::to_string(&stored)?;
                entry.insert(stored.clone());
                hub.publish(R::FILTER, StoreEvent::new(event_type, payload));
                Ok(stored)
            },
            Entry::Vacant(entry) => {
                let stored = prepare_upsert(incoming, None, now, max_ttl)?;
                let payload = serde_json::to_string(&stored)?;
                entry.insert(stored.clone());
                hub.publish(R::FILTER, StoreEvent::new(EventType::Create, payload));
                Ok(stored)
            },
        }
    }

    fn delete(&self, record: &R, now: DateTime<Utc>, hub: &EventHub) -> Result<(), RegistryError> {
        let key = record.key();
        match self.records.entry(key.clone()) {
            Entry::Occupied(entry) if entry.get().is_live(now) => {
                let payload = serde_json::to_string(entry.get())?;
                hub.publish(R::FILTER, StoreEvent::new(EventType::Delete, payload));
                entry.remove();
                Ok(())
            },
            _ => Err(RegistryError::NotFound { key: key.to_string() }),
        }
    }

    fn read(&self, now: DateTime<Utc>) -> Vec<R> {
        self.records.iter().filter(|entry| entry.is_live(now)).map(|entry| entry.value().clone()).collect()
    }

    fn prune(&self, now: DateTime<Utc>, hub: &EventHub) -> Result<usize, RegistryError> {
        let expired: Vec<R::Key> = self
            .records
            .iter()
            .filter(|entry| !entry.is_live(now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut pruned = 0;
        for key in expired {
            // Re-check under the entry lock: the key may have been refreshed meanwhile.
            if let Entry::Occupied(entry) = self.records.entry(key) {
                if !entry.get().is_live(now) {
                    let payload = serde_json::to_string(entry.get())?;
                    hub.publish(R::FILTER, StoreEvent::new(EventType::Expire, payload));
                    entry.remove();
                    pruned += 1;
                }
            }
        }
        Ok(pruned)
    }
}

/// Route store held in process memory.
///
/// Used when no database is configured and as the registry double in tests.
pub struct MemoryRouteStore {
    routes: RecordTable<Route>,
    tcp_routes: RecordTable<TcpRouteMapping>,
    hub: EventHub,
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
}

impl MemoryRouteStore {
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            routes: RecordTable::new(),
            tcp_routes: RecordTable::new(),
            hub: EventHub::new(config.watch_buffer),
            config,
            clock,
        }
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }
}

#[async_trait]
impl RouteStore for MemoryRouteStore {
    async fn save_route(&self, route: Route) -> Result<Route, RegistryError> {
        self.routes.upsert(route, self.clock.now(), self.config.max_ttl_secs, &self.hub)
    }

    async fn save_tcp_route_mapping(
        &self,
        mapping: TcpRouteMapping,
    ) -> Result<TcpRouteMapping, RegistryError> {
        self.tcp_routes.upsert(mapping, self.clock.now(), self.config.max_ttl_secs, &self.hub)
    }

    async fn delete_route(&self, route: &Route) -> Result<(), RegistryError> {
        self.routes.delete(route, self.clock.now(), &self.hub)
    }

    async fn delete_tcp_route_mapping(&self, mapping: &TcpRouteMapping) -> Result<(), RegistryError> {
        self.tcp_routes.delete(mapping, self.clock.now(), &self.hub)
    }

    async fn read_routes(&self) -> Result<Vec<Route>, RegistryError> {
        Ok(self.routes.read(self.clock.now()))
    }

    async fn read_tcp_route_mappings(&self) -> Result<Vec<TcpRouteMapping>, RegistryError> {
        Ok(self.tcp_routes.read(self.clock.now()))
    }

    fn watch_changes(&self, filter: WatchFilter) -> WatchHandle {
        self.hub.subscribe(filter)
    }

    async fn prune_expired(&self) -> Result<usize, RegistryError> {
        let now = self.clock.now();
        let pruned = self.routes.prune(now, &self.hub)? + self.tcp_routes.prune(now, &self.hub)?;
        if pruned > 0 {
            debug!(pruned, "expired records removed");
        }
        Ok(pruned)
    }
}
