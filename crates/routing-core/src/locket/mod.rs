//! Leader lock and presence maintenance.
//!
//! A [`LockSession`] is a renewed coordination-service session; a
//! [`Maintainer`] drives one session through the acquire/hold/retry cycle
//! described by the [`machine`] transition table.

mod client;
pub mod machine;
mod maintainer;
mod memory;
mod postgres;
mod session;

pub use client::CoordinationClient;
pub use machine::{transition, Effect, LockPolicy, MaintainerState, Transition, Trigger};
pub use maintainer::Maintainer;
pub use memory::MemoryCoordinator;
pub use postgres::PgCoordinator;
pub use session::{LockSession, LossSignal};
