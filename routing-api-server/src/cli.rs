use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "routing-api-server",
    about = "Routing API - leader-gated route registry with live change streams",
    version = env!("CARGO_PKG_VERSION"),
    author
)]
pub struct Cli {
    #[arg(short, long, env = "ROUTING_API_CONFIG", help = "Path to a JSON config file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, env = "ROUTING_API_PORT", help = "Override the listen port")]
    pub port: Option<u16>,

    #[arg(long, env = "ROUTING_API_BIND", help = "Override the bind address")]
    pub bind_address: Option<String>,

    #[arg(
        long,
        env = "DATABASE_URL",
        hide_env_values = true,
        help = "PostgreSQL URL; in-memory backends are used when unset"
    )]
    pub database_url: Option<String>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_arguments() {
        let cli = Cli::try_parse_from(["routing-api-server"]).unwrap();
        assert!(cli.config.is_none());
        assert!(cli.port.is_none());
    }

    #[test]
    fn test_overrides_parse() {
        let cli = Cli::try_parse_from([
            "routing-api-server",
            "--config",
            "/etc/routing-api.json",
            "--port",
            "3050",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/routing-api.json")));
        assert_eq!(cli.port, Some(3050));
        assert_eq!(cli.log_level, "debug");
    }
}
