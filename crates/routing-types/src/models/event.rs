//! Change-feed event types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw event kind emitted by a route store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Unknown or undecodable change; terminates the subscriber stream
    Invalid,
    Create,
    Update,
    Delete,
    /// Record passed its expiry deadline and was swept
    Expire,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invalid => "Invalid",
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Expire => "Expire",
        };
        f.write_str(name)
    }
}

/// Event as published by a store: kind plus the serialized record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub event_type: EventType,
    /// Opaque JSON encoding of the affected record
    pub value: String,
}

impl StoreEvent {
    pub fn new(event_type: EventType, value: impl Into<String>) -> Self {
        Self { event_type, value: value.into() }
    }
}

/// Which record family a watch follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchFilter {
    HttpRoutes,
    TcpRoutes,
}

impl fmt::Display for WatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpRoutes => f.write_str("http_routes"),
            Self::TcpRoutes => f.write_str("tcp_routes"),
        }
    }
}

/// Domain event name delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventName {
    Upsert,
    Delete,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upsert => "Upsert",
            Self::Delete => "Delete",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event as delivered on one subscriber connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberEvent {
    /// Per-connection sequence number, starting at 0
    pub id: u64,
    pub name: EventName,
    pub data: String,
}
