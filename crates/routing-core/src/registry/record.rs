//! Shared upsert rules for HTTP routes and TCP route mappings.

use chrono::{DateTime, Utc};
use routing_types::{
    HttpRouteKey, ModificationTag, RegistryError, Route, TcpRouteKey, TcpRouteMapping, WatchFilter,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::hash::Hash;

/// A record family kept by the registry.
pub(crate) trait StoredRecord:
    Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Key: Clone + Eq + Hash + Serialize + fmt::Display + Send + Sync + 'static;

    const FILTER: WatchFilter;
    const TABLE: &'static str;

    fn key(&self) -> Self::Key;
    fn ttl(&self) -> Option<u32>;
    fn set_ttl(&mut self, ttl: u32);
    fn expires_at(&self) -> Option<DateTime<Utc>>;
    fn set_expires_at(&mut self, at: DateTime<Utc>);
    fn tag(&self) -> &ModificationTag;
    fn set_tag(&mut self, tag: ModificationTag);
    fn validate(&self, max_ttl: u32) -> Result<(), RegistryError>;

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map_or(true, |at| at > now)
    }
}

impl StoredRecord for Route {
    type Key = HttpRouteKey;

    const FILTER: WatchFilter = WatchFilter::HttpRoutes;
    const TABLE: &'static str = "http_routes";

    fn key(&self) -> HttpRouteKey {
        Route::key(self)
    }

    fn ttl(&self) -> Option<u32> {
        self.ttl
    }

    fn set_ttl(&mut self, ttl: u32) {
        self.ttl = Some(ttl);
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    fn set_expires_at(&mut self, at: DateTime<Utc>) {
        self.expires_at = Some(at);
    }

    fn tag(&self) -> &ModificationTag {
        &self.modification_tag
    }

    fn set_tag(&mut self, tag: ModificationTag) {
        self.modification_tag = tag;
    }

    fn validate(&self, max_ttl: u32) -> Result<(), RegistryError> {
        validate_route(self, max_ttl)
    }
}

impl StoredRecord for TcpRouteMapping {
    type Key = TcpRouteKey;

    const FILTER: WatchFilter = WatchFilter::TcpRoutes;
    const TABLE: &'static str = "tcp_routes";

    fn key(&self) -> TcpRouteKey {
        TcpRouteMapping::key(self)
    }

    fn ttl(&self) -> Option<u32> {
        self.ttl
    }

    fn set_ttl(&mut self, ttl: u32) {
        self.ttl = Some(ttl);
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    fn set_expires_at(&mut self, at: DateTime<Utc>) {
        self.expires_at = Some(at);
    }

    fn tag(&self) -> &ModificationTag {
        &self.modification_tag
    }

    fn set_tag(&mut self, tag: ModificationTag) {
        self.modification_tag = tag;
    }

    fn validate(&self, max_ttl: u32) -> Result<(), RegistryError> {
        validate_tcp_route_mapping(self, max_ttl)
    }
}

fn invalid(message: impl Into<String>) -> RegistryError {
    RegistryError::InvalidRoute { message: message.into() }
}

fn validate_ttl(ttl: Option<u32>, max_ttl: u32) -> Result<(), RegistryError> {
    match ttl {
        Some(0) => Err(invalid("ttl must be greater than 0")),
        Some(ttl) if ttl > max_ttl => {
            Err(invalid(format!("ttl {ttl} exceeds the maximum of {max_ttl} seconds")))
        },
        _ => Ok(()),
    }
}

/// Check an HTTP route before it is saved.
pub fn validate_route(route: &Route, max_ttl: u32) -> Result<(), RegistryError> {
    if route.route.trim().is_empty() {
        return Err(invalid("route must not be empty"));
    }
    if route.ip.trim().is_empty() {
        return Err(invalid("ip must not be empty"));
    }
    if route.port == 0 {
        return Err(invalid("port must be greater than 0"));
    }
    validate_ttl(route.ttl, max_ttl)
}

/// Check a TCP route mapping before it is saved.
pub fn validate_tcp_route_mapping(mapping: &TcpRouteMapping, max_ttl: u32) -> Result<(), RegistryError> {
    if mapping.router_group_guid.trim().is_empty() {
        return Err(invalid("router_group_guid must not be empty"));
    }
    if mapping.port == 0 {
        return Err(invalid("port must be greater than 0"));
    }
    if mapping.backend_ip.trim().is_empty() {
        return Err(invalid("backend_ip must not be empty"));
    }
    if mapping.backend_port == 0 {
        return Err(invalid("backend_port must be greater than 0"));
    }
    validate_ttl(mapping.ttl, max_ttl)
}

/// Stamp an incoming record for storage.
///
/// A missing TTL becomes `max_ttl`; the expiry deadline is recomputed from
/// `now`; the tag is the existing one bumped by one, or a fresh tag for a new
/// key.
pub(crate) fn prepare_upsert<R: StoredRecord>(
    mut incoming: R,
    existing: Option<&ModificationTag>,
    now: DateTime<Utc>,
    max_ttl: u32,
) -> Result<R, RegistryError> {
    incoming.validate(max_ttl)?;

    let ttl = incoming.ttl().unwrap_or(max_ttl);
    incoming.set_ttl(ttl);
    incoming.set_expires_at(now + chrono::Duration::seconds(i64::from(ttl)));

    let tag = match existing {
        Some(tag) => {
            let mut next = tag.clone();
            next.increment();
            next
        },
        None => ModificationTag::new(),
    };
    incoming.set_tag(tag);
    Ok(incoming)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_missing_ttl_defaults_to_max() {
        let mut route = Route::new("api.example.com", 8080, "10.0.0.1", 1);
        route.ttl = None;

        let stored = prepare_upsert(route, None, at(0), 120).unwrap();
        assert_eq!(stored.ttl, Some(120));
        assert_eq!(stored.expires_at, Some(at(120)));
        assert_eq!(stored.modification_tag.index, 0);
        assert!(!stored.modification_tag.guid.is_empty());
    }

    #[test]
    fn test_existing_tag_is_bumped() {
        let previous = ModificationTag { guid: "g".to_string(), index: 4 };
        let route = Route::new("api.example.com", 8080, "10.0.0.1", 30);

        let stored = prepare_upsert(route, Some(&previous), at(10), 120).unwrap();
        assert_eq!(stored.modification_tag, ModificationTag { guid: "g".to_string(), index: 5 });
        assert_eq!(stored.expires_at, Some(at(40)));
    }

    #[test]
    fn test_invalid_routes_rejected() {
        let cases = [
            Route::new("", 8080, "10.0.0.1", 30),
            Route::new("api.example.com", 0, "10.0.0.1", 30),
            Route::new("api.example.com", 8080, " ", 30),
            Route::new("api.example.com", 8080, "10.0.0.1", 0),
            Route::new("api.example.com", 8080, "10.0.0.1", 121),
        ];
        for route in cases {
            let err = validate_route(&route, 120).unwrap_err();
            assert!(matches!(err, RegistryError::InvalidRoute { .. }), "{route:?}");
        }
    }

    #[test]
    fn test_tcp_backend_port_required() {
        let mapping = TcpRouteMapping::new("rg1", 9000, "10.0.0.1", 0, 5);
        let err = validate_tcp_route_mapping(&mapping, 120).unwrap_err();
        assert_eq!(
            err,
            RegistryError::InvalidRoute { message: "backend_port must be greater than 0".to_string() }
        );
    }

    #[test]
    fn test_liveness_is_strict() {
        let mut route = Route::new("api.example.com", 8080, "10.0.0.1", 30);
        route.expires_at = Some(at(30));
        assert!(route.is_live(at(29)));
        assert!(!route.is_live(at(30)));
    }
}
