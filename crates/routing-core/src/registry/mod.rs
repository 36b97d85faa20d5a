//! TTL-governed route registry.
//!
//! ```text
//! RouteStore ── MemoryRouteStore ─┐
//!            └─ PgRouteStore ─────┴─> EventHub ──> WatchHandle (one per watch)
//! ```

mod clock;
mod hub;
mod memory;
mod postgres;
mod record;
mod store;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use hub::EventHub;
pub use memory::MemoryRouteStore;
pub use postgres::PgRouteStore;
pub use record::{validate_route, validate_tcp_route_mapping};
pub use store::{RouteStore, WatchCancel, WatchHandle};
pub use sweeper::start_expiry_sweeper;

#[cfg(test)]
mod tests;
