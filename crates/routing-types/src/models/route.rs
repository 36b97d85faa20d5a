//! HTTP routes and TCP route mappings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::tag::ModificationTag;

/// HTTP route: a host/path served by one backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    /// Host and optional path, e.g. `api.example.com/v2`
    pub route: String,
    /// Backend port
    pub port: u16,
    /// Backend address
    pub ip: String,
    /// Time-to-live in seconds; defaults to the registry maximum when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Correlation id for router access logs
    #[serde(default)]
    pub log_guid: String,
    /// Route service the router forwards through first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_service_url: Option<String>,
    /// Absolute expiry deadline, set by the registry on every upsert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Set by the registry on every upsert
    #[serde(default)]
    pub modification_tag: ModificationTag,
}

impl Route {
    pub fn new(route: impl Into<String>, port: u16, ip: impl Into<String>, ttl: u32) -> Self {
        Self {
            route: route.into(),
            port,
            ip: ip.into(),
            ttl: Some(ttl),
            log_guid: String::new(),
            route_service_url: None,
            expires_at: None,
            modification_tag: ModificationTag::default(),
        }
    }

    pub fn key(&self) -> HttpRouteKey {
        HttpRouteKey { route: self.route.clone(), port: self.port, ip: self.ip.clone() }
    }
}

/// Natural key of an HTTP route.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HttpRouteKey {
    pub route: String,
    pub port: u16,
    pub ip: String,
}

impl fmt::Display for HttpRouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}:{}", self.route, self.ip, self.port)
    }
}

/// TCP route mapping: an external router-group port forwarded to a backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TcpRouteMapping {
    pub router_group_guid: String,
    /// External port on the router group
    pub port: u16,
    pub backend_ip: String,
    pub backend_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_sni_hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolation_segment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_tls_port: Option<u16>,
    /// Time-to-live in seconds; defaults to the registry maximum when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modification_tag: ModificationTag,
}

impl TcpRouteMapping {
    pub fn new(
        router_group_guid: impl Into<String>,
        port: u16,
        backend_ip: impl Into<String>,
        backend_port: u16,
        ttl: u32,
    ) -> Self {
        Self {
            router_group_guid: router_group_guid.into(),
            port,
            backend_ip: backend_ip.into(),
            backend_port,
            backend_sni_hostname: None,
            instance_id: None,
            isolation_segment: None,
            host_tls_port: None,
            ttl: Some(ttl),
            expires_at: None,
            modification_tag: ModificationTag::default(),
        }
    }

    pub fn key(&self) -> TcpRouteKey {
        TcpRouteKey {
            router_group_guid: self.router_group_guid.clone(),
            port: self.port,
            backend_ip: self.backend_ip.clone(),
            backend_port: self.backend_port,
            backend_sni_hostname: self.backend_sni_hostname.clone(),
        }
    }
}

/// Natural key of a TCP route mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TcpRouteKey {
    pub router_group_guid: String,
    pub port: u16,
    pub backend_ip: String,
    pub backend_port: u16,
    pub backend_sni_hostname: Option<String>,
}

impl fmt::Display for TcpRouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}:{}",
            self.router_group_guid, self.port, self.backend_ip, self.backend_port
        )?;
        if let Some(sni) = &self.backend_sni_hostname {
            write!(f, " (sni {sni})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_route_json_shape() {
        let route = Route::new("api.example.com", 8080, "10.0.0.5", 60);
        let json = serde_json::to_value(&route).unwrap();

        assert_eq!(json["route"], "api.example.com");
        assert_eq!(json["port"], 8080);
        assert_eq!(json["ttl"], 60);
        assert!(json.get("expires_at").is_none());
        assert!(json.get("route_service_url").is_none());
    }

    #[test]
    fn test_route_accepts_minimal_payload() {
        let route: Route =
            serde_json::from_str(r#"{"route":"a.example.com","port":80,"ip":"1.2.3.4"}"#).unwrap();
        assert_eq!(route.ttl, None);
        assert_eq!(route.modification_tag, ModificationTag::default());
    }

    #[test]
    fn test_tcp_key_includes_sni() {
        let mut mapping = TcpRouteMapping::new("rg1", 9000, "10.0.0.1", 6000, 5);
        let plain = mapping.key();
        mapping.backend_sni_hostname = Some("db.internal".to_string());

        assert_ne!(plain, mapping.key());
        assert_eq!(mapping.key().to_string(), "rg1:9000->10.0.0.1:6000 (sni db.internal)");
    }
}
