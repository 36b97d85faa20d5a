//! # Routing Core
//!
//! Leadership and registry engine behind the routing API daemon.
//!
//! ## Architecture
//!
//! ```text
//! routing-core/src/
//! ├── locket/     # lock sessions, lock/presence state machine, coordination backends
//! ├── registry/   # TTL route store (memory + Postgres), event hub, expiry sweeper
//! ├── watch/      # store event translation and per-subscriber event streams
//! └── db.rs       # Postgres pool and error mapping shared by both backends
//! ```
//!
//! Only one replica in a fleet holds the leader lock at a time; that replica
//! serves registry writes and fans changes out to every connected subscriber.

#![allow(
    clippy::significant_drop_tightening,
    reason = "Lock guards are held across event publication to keep per-key ordering"
)]
#![allow(
    clippy::derive_partial_eq_without_eq,
    reason = "Some types intentionally don't implement Eq"
)]
// Test-only lints: allow panic!, expect, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::assertions_on_result_states
    )
)]

pub mod db;
pub mod locket;
pub mod registry;
pub mod watch;

// Re-export commonly used types
pub use locket::{
    CoordinationClient, LockPolicy, LockSession, LossSignal, Maintainer, MaintainerState,
    MemoryCoordinator, PgCoordinator,
};
pub use registry::{
    start_expiry_sweeper, Clock, EventHub, ManualClock, MemoryRouteStore, PgRouteStore,
    RouteStore, SystemClock, WatchCancel, WatchHandle,
};
pub use watch::{translate, SubscriberStream, Translated};
