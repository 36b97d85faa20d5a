//! Daemon, lock, and registry configuration models.

mod lock;
mod registry;
mod server;

pub use lock::{LockConfig, PresenceConfig};
pub use registry::RegistryConfig;
pub use server::ServerConfig;
