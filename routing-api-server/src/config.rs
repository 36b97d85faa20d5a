//! Configuration loading: JSON file, then CLI/env overrides, then validation.

use routing_types::{ConfigError, ServerConfig};
use std::path::Path;

use crate::cli::Cli;

/// Read a JSON config file. Every field is optional.
pub fn load_file(path: &Path) -> Result<ServerConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::NotFound { path: path.display().to_string() })?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::from_json_error(&e))
}

/// Build the effective configuration for this process.
pub fn resolve(cli: &Cli) -> Result<ServerConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_file(path)?,
        None => ServerConfig::default(),
    };

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind_address) = &cli.bind_address {
        config.bind_address.clone_from(bind_address);
    }
    if let Some(database_url) = &cli.database_url {
        config.database_url = Some(database_url.clone());
    }

    config.check()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["routing-api-server"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_file_values_apply() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 4100, "lock": {{"key": "edge_lock", "retry_interval_ms": 250}}}}"#).unwrap();

        let config = load_file(file.path()).unwrap();
        assert_eq!(config.port, 4100);
        assert_eq!(config.lock.key, "edge_lock");
        assert_eq!(config.lock.retry_interval_ms, 250);
        assert_eq!(config.lock.session_ttl_secs, 15);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 4100}}"#).unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let config = resolve(&cli(&["--config", &path, "--port", "4200"])).unwrap();
        assert_eq!(config.port, 4200);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = load_file(Path::new("/nonexistent/routing-api.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let err = load_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"registry": {{"max_ttl_secs": 0}}}}"#).unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let err = resolve(&cli(&["--config", &path])).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }
}
