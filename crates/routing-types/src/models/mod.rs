//! Core domain models for the routing API.
//!
//! This module contains all shared data structures used across the workspace.

mod config;
mod event;
mod route;
mod tag;

// Re-export all models
pub use config::{LockConfig, PresenceConfig, RegistryConfig, ServerConfig};
pub use event::{EventName, EventType, StoreEvent, SubscriberEvent, WatchFilter};
pub use route::{HttpRouteKey, Route, TcpRouteKey, TcpRouteMapping};
pub use tag::ModificationTag;
