//! Configuration management for odbc-relay.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with support for named connection strings and execution settings.

use crate::connection::HandleRetention;
use crate::error::{RelayError, Result};
use crate::query::DEFAULT_VALUE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when no connection is given explicitly.
pub const CONNECTION_ENV_VAR: &str = "ODBC_RELAY_CONNECTION";

/// Main configuration structure for odbc-relay.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Pipeline settings.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Named connection strings.
    #[serde(default)]
    pub connections: HashMap<String, String>,
}

/// Settings applied to every statement execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Seconds to wait for the background pipeline; `0` waits forever.
    pub statement_timeout_secs: u64,

    /// Size in bytes of the buffer each fetched value is read into,
    /// terminator included.
    pub value_capacity: usize,

    /// Which handles stay allocated after connecting.
    pub handle_retention: HandleRetention,
}

fn default_statement_timeout_secs() -> u64 {
    30
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            statement_timeout_secs: default_statement_timeout_secs(),
            value_capacity: DEFAULT_VALUE_CAPACITY,
            handle_retention: HandleRetention::default(),
        }
    }
}

impl ExecutionConfig {
    /// Returns the timeout, or `None` when disabled.
    pub fn statement_timeout(&self) -> Option<Duration> {
        (self.statement_timeout_secs > 0).then(|| Duration::from_secs(self.statement_timeout_secs))
    }

    /// Checks that the settings are usable.
    pub fn validate(&self) -> Result<()> {
        if self.value_capacity < 2 {
            return Err(RelayError::config(format!(
                "value_capacity must be at least 2, got {}",
                self.value_capacity
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("odbc-relay")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses and validates configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            RelayError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.execution.validate()?;
        Ok(config)
    }

    /// Gets a named connection string, or the `default` one if name is None.
    pub fn get_connection(&self, name: Option<&str>) -> Option<&str> {
        let key = name.unwrap_or("default");
        self.connections.get(key).map(String::as_str)
    }
}
