//! # Routing Types
//!
//! Core types, models, and error definitions for the routing API.
//!
//! This crate provides the foundational type system shared by the registry
//! engine and the HTTP daemon:
//!
//! - **`error`** - Typed error hierarchy for locks, the registry, and configuration
//! - **`models`** - Domain models (Route, TcpRouteMapping, ModificationTag, events, config)
//!
//! ## Architecture Role
//!
//! `routing-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!                routing-types (this crate)
//!                        │
//!                        ▼
//!                  routing-core
//!          (locket, registry, watch)
//!                        │
//!                        ▼
//!               routing-api-server
//! ```
//!
//! All types are designed to be:
//! - **Serializable** via serde for API and store payloads
//! - **Clone** for cheap sharing across async boundaries
//! - **PartialEq** for testing and comparison

pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{ConfigError, LockError, RegistryError, Result, TypedError};

// Re-export core model types
pub use models::{
    EventName, EventType, HttpRouteKey, ModificationTag, Route, ServerConfig, StoreEvent,
    SubscriberEvent, TcpRouteKey, TcpRouteMapping, WatchFilter,
};
