use tracing_subscriber::{fmt, EnvFilter};

/// Install the global fmt subscriber.
///
/// `level` is an `EnvFilter` directive (`info`, `routing_core=debug,info`);
/// an unparsable directive falls back to `info`.
pub fn init(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}
