use super::*;
use chrono::{DateTime, TimeZone, Utc};
use routing_types::models::RegistryConfig;
use routing_types::{EventType, RegistryError, Route, TcpRouteMapping, WatchFilter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn store() -> (Arc<ManualClock>, MemoryRouteStore) {
    let clock = Arc::new(ManualClock::new(start()));
    let store = MemoryRouteStore::with_clock(RegistryConfig::default(), clock.clone());
    (clock, store)
}

fn tcp_mapping(ttl: u32) -> TcpRouteMapping {
    let mut mapping = TcpRouteMapping::new("rg1", 9000, "10.0.0.1", 6000, ttl);
    mapping.instance_id = Some("g1".to_string());
    mapping
}

#[tokio::test]
async fn test_upsert_sets_expiry_and_bumps_tag() {
    let (clock, store) = store();

    let first = store.save_route(Route::new("api.example.com", 8080, "10.0.0.1", 30)).await.unwrap();
    assert_eq!(first.expires_at, Some(start() + chrono::Duration::seconds(30)));
    assert_eq!(first.modification_tag.index, 0);

    clock.advance(chrono::Duration::seconds(10));
    let second = store.save_route(Route::new("api.example.com", 8080, "10.0.0.1", 60)).await.unwrap();

    assert_eq!(second.expires_at, Some(start() + chrono::Duration::seconds(70)));
    assert_eq!(second.modification_tag.guid, first.modification_tag.guid);
    assert_eq!(second.modification_tag.index, first.modification_tag.index + 1);
    assert_eq!(store.read_routes().await.unwrap(), vec![second]);
}

#[tokio::test]
async fn test_tcp_reupsert_extends_expiry() {
    let (clock, store) = store();

    let first = store.save_tcp_route_mapping(tcp_mapping(5)).await.unwrap();
    clock.advance(chrono::Duration::seconds(1));
    let second = store.save_tcp_route_mapping(tcp_mapping(9)).await.unwrap();

    assert!(second.expires_at > first.expires_at);
    assert_eq!(second.modification_tag.index, first.modification_tag.index + 1);
    assert_eq!(store.read_tcp_route_mappings().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_ttl_uses_registry_maximum() {
    let (_, store) = store();
    let mut route = Route::new("api.example.com", 8080, "10.0.0.1", 1);
    route.ttl = None;

    let saved = store.save_route(route).await.unwrap();
    assert_eq!(saved.ttl, Some(120));
    assert_eq!(saved.expires_at, Some(start() + chrono::Duration::seconds(120)));
}

#[tokio::test]
async fn test_invalid_route_is_not_stored() {
    let (_, store) = store();

    let err = store.save_route(Route::new("api.example.com", 8080, "10.0.0.1", 500)).await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidRoute { .. }));
    assert!(store.read_routes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_records_are_hidden_then_swept() {
    let (clock, store) = store();
    let mut feed = store.watch_changes(WatchFilter::HttpRoutes);

    store.save_route(Route::new("api.example.com", 8080, "10.0.0.1", 5)).await.unwrap();
    assert_eq!(feed.events.recv().await.unwrap().event_type, EventType::Create);

    clock.advance(chrono::Duration::seconds(5));
    assert!(store.read_routes().await.unwrap().is_empty());

    assert_eq!(store.prune_expired().await.unwrap(), 1);
    let expired = feed.events.recv().await.unwrap();
    assert_eq!(expired.event_type, EventType::Expire);
    let record: Route = serde_json::from_str(&expired.value).unwrap();
    assert_eq!(record.route, "api.example.com");

    assert_eq!(store.prune_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn test_upsert_after_expiry_starts_new_generation() {
    let (clock, store) = store();

    let first = store.save_route(Route::new("api.example.com", 8080, "10.0.0.1", 5)).await.unwrap();
    clock.advance(chrono::Duration::seconds(6));
    let second = store.save_route(Route::new("api.example.com", 8080, "10.0.0.1", 5)).await.unwrap();

    assert_ne!(second.modification_tag.guid, first.modification_tag.guid);
    assert_eq!(second.modification_tag.index, 0);
}

#[tokio::test]
async fn test_delete_missing_returns_not_found() {
    let (_, store) = store();

    let err = store.delete_tcp_route_mapping(&tcp_mapping(5)).await.unwrap_err();
    assert_eq!(err, RegistryError::NotFound { key: "rg1:9000->10.0.0.1:6000".to_string() });
}

#[tokio::test]
async fn test_watch_sees_create_update_delete_in_order() {
    let (_, store) = store();
    let mut feed = store.watch_changes(WatchFilter::HttpRoutes);
    let mut tcp_feed = store.watch_changes(WatchFilter::TcpRoutes);

    let route = Route::new("api.example.com", 8080, "10.0.0.1", 30);
    store.save_route(route.clone()).await.unwrap();
    store.save_route(route.clone()).await.unwrap();
    store.delete_route(&route).await.unwrap();

    let kinds: Vec<EventType> = [
        feed.events.recv().await.unwrap(),
        feed.events.recv().await.unwrap(),
        feed.events.recv().await.unwrap(),
    ]
    .into_iter()
    .map(|event| event.event_type)
    .collect();
    assert_eq!(kinds, vec![EventType::Create, EventType::Update, EventType::Delete]);

    // The TCP feed saw nothing.
    assert!(timeout(Duration::from_millis(50), tcp_feed.events.recv()).await.is_err());
}

#[tokio::test]
async fn test_cancel_releases_hub_subscription() {
    let (_, store) = store();
    let mut feed = store.watch_changes(WatchFilter::HttpRoutes);
    assert_eq!(store.hub().watcher_count(WatchFilter::HttpRoutes), 1);

    feed.cancel();
    feed.cancel();
    assert!(feed.is_cancelled());

    timeout(Duration::from_secs(1), async {
        while store.hub().watcher_count(WatchFilter::HttpRoutes) > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert!(feed.events.recv().await.is_none());
}

#[tokio::test]
async fn test_slow_watcher_gets_lagged_error() {
    let clock = Arc::new(ManualClock::new(start()));
    let config = RegistryConfig { watch_buffer: 2, ..RegistryConfig::default() };
    let store = MemoryRouteStore::with_clock(config, clock);
    let mut slow = store.watch_changes(WatchFilter::HttpRoutes);

    for port in 1..=10 {
        store.save_route(Route::new("api.example.com", port, "10.0.0.1", 30)).await.unwrap();
    }

    let err = timeout(Duration::from_secs(1), async {
        loop {
            tokio::select! {
                biased;
                err = slow.errors.recv() => break err,
                _ = slow.events.recv() => {},
            }
        }
    })
    .await
    .unwrap();
    assert!(matches!(err, Some(RegistryError::Lagged { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_prunes_until_shutdown() {
    let clock = Arc::new(ManualClock::new(start()));
    let store: Arc<dyn RouteStore> =
        Arc::new(MemoryRouteStore::with_clock(RegistryConfig::default(), clock.clone()));
    let mut feed = store.watch_changes(WatchFilter::TcpRoutes);

    store.save_tcp_route_mapping(tcp_mapping(5)).await.unwrap();
    feed.events.recv().await.unwrap();
    clock.advance(chrono::Duration::seconds(10));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = start_expiry_sweeper(Arc::clone(&store), Duration::from_secs(1), shutdown_rx);

    let expired = timeout(Duration::from_secs(5), feed.events.recv()).await.unwrap().unwrap();
    assert_eq!(expired.event_type, EventType::Expire);

    shutdown_tx.send_replace(true);
    timeout(Duration::from_secs(5), sweeper).await.unwrap().unwrap();
}
