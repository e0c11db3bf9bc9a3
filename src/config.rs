//! Server configuration.
//!
//! Values come from `PR_REVIEWER_*` environment variables; anything unset
//! falls back to the defaults below.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const ENV_HOST: &str = "PR_REVIEWER_HOST";
const ENV_PORT: &str = "PR_REVIEWER_PORT";
const ENV_DATABASE_PATH: &str = "PR_REVIEWER_DATABASE_PATH";
const ENV_MAX_CONNECTIONS: &str = "PR_REVIEWER_DB_MAX_CONNECTIONS";
const ENV_OPERATION_TIMEOUT: &str = "PR_REVIEWER_OPERATION_TIMEOUT_SECS";

/// Runtime configuration for the HTTP server and database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Connection pool size.
    pub max_connections: u32,

    /// Deadline for a single service operation, in seconds.
    pub operation_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_path: PathBuf::from("data/pr-reviewer.db"),
            max_connections: 5,
            operation_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            host: lookup(ENV_HOST).unwrap_or(defaults.host),
            port: parse_var(&lookup, ENV_PORT, "port")?.unwrap_or(defaults.port),
            database_path: lookup(ENV_DATABASE_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            max_connections: parse_var(&lookup, ENV_MAX_CONNECTIONS, "max_connections")?
                .unwrap_or(defaults.max_connections),
            operation_timeout_secs: parse_var(
                &lookup,
                ENV_OPERATION_TIMEOUT,
                "operation_timeout_secs",
            )?
            .unwrap_or(defaults.operation_timeout_secs),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.port < 1024 {
            return Err(AppError::invalid_input_field(
                "Port must be between 1024 and 65535",
                "port",
            ));
        }
        if self.max_connections == 0 {
            return Err(AppError::invalid_input_field(
                "Pool needs at least one connection",
                "max_connections",
            ));
        }
        if self.operation_timeout_secs == 0 {
            return Err(AppError::invalid_input_field(
                "Operation timeout must be at least one second",
                "operation_timeout_secs",
            ));
        }
        Ok(())
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::invalid_input_field(format!("Invalid host: {}", e), "host"))
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, field: &str) -> Result<Option<T>, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            AppError::invalid_input_field(format!("Invalid value for {}: {}", key, e), field)
        }),
    }
}
