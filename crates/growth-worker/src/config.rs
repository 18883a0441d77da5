//! Worker configuration loaded from environment variables.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use growth::DEFAULT_MAX_ATTEMPTS;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value `{value}`")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Where events and read models are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" => Ok(StorageBackend::Postgres),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Process configuration.
///
/// Reads from environment variables:
/// - `STORAGE_BACKEND`: `memory` or `postgres` (default: `memory`)
/// - `DATABASE_URL`: required when the backend is `postgres`
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `COMMAND_MAX_ATTEMPTS`: attempts per command on version conflicts (default: `3`)
/// - `REPAIR_INTERVAL_SECS`: seconds between repair passes (default: `30`)
/// - `METRICS_ADDR`: Prometheus listener address, disabled when unset
/// - `RUST_LOG`: tracing filter directive (default: `info`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub command_max_attempts: u32,
    pub repair_interval: Duration,
    pub metrics_addr: Option<SocketAddr>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Memory,
            database_url: None,
            database_max_connections: 5,
            command_max_attempts: DEFAULT_MAX_ATTEMPTS,
            repair_interval: Duration::from_secs(30),
            metrics_addr: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(v) => parse("STORAGE_BACKEND", v)?,
            None => defaults.storage_backend,
        };
        let database_url = var("DATABASE_URL");
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let database_max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(v) => parse("DATABASE_MAX_CONNECTIONS", v)?,
            None => defaults.database_max_connections,
        };
        let command_max_attempts = match var("COMMAND_MAX_ATTEMPTS") {
            Some(v) => parse::<NonZeroU32>("COMMAND_MAX_ATTEMPTS", v)?.get(),
            None => defaults.command_max_attempts,
        };
        let repair_interval = match var("REPAIR_INTERVAL_SECS") {
            Some(v) => Duration::from_secs(parse("REPAIR_INTERVAL_SECS", v)?),
            None => defaults.repair_interval,
        };
        let metrics_addr = var("METRICS_ADDR")
            .map(|v| parse("METRICS_ADDR", v))
            .transpose()?;
        let log_format = match var("LOG_FORMAT") {
            Some(v) => parse("LOG_FORMAT", v)?,
            None => defaults.log_format,
        };

        Ok(Self {
            storage_backend,
            database_url,
            database_max_connections,
            command_max_attempts,
            repair_interval,
            metrics_addr,
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        assert_eq!(load(&[]).unwrap(), Config::default());
    }

    #[test]
    fn postgres_needs_a_database_url() {
        assert_eq!(
            load(&[("STORAGE_BACKEND", "postgres")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        );

        let config = load(&[
            ("STORAGE_BACKEND", "Postgres"),
            ("DATABASE_URL", "postgres://localhost/growth"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
        ])
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Postgres);
        assert_eq!(config.database_max_connections, 12);
    }

    #[test]
    fn values_are_parsed() {
        let config = load(&[
            ("COMMAND_MAX_ATTEMPTS", "5"),
            ("REPAIR_INTERVAL_SECS", "2"),
            ("METRICS_ADDR", "127.0.0.1:9100"),
            ("RUST_LOG", "growth=debug"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.command_max_attempts, 5);
        assert_eq!(config.repair_interval, Duration::from_secs(2));
        assert_eq!(config.metrics_addr, Some("127.0.0.1:9100".parse().unwrap()));
        assert_eq!(config.log_level, "growth=debug");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_are_reported_by_name() {
        assert_eq!(
            load(&[("REPAIR_INTERVAL_SECS", "soon")]),
            Err(ConfigError::Invalid {
                name: "REPAIR_INTERVAL_SECS",
                value: "soon".to_string()
            })
        );
        assert!(matches!(
            load(&[("COMMAND_MAX_ATTEMPTS", "0")]),
            Err(ConfigError::Invalid {
                name: "COMMAND_MAX_ATTEMPTS",
                ..
            })
        ));
        assert!(load(&[("STORAGE_BACKEND", "sqlite")]).is_err());
    }
}
