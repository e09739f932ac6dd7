//! Executor configuration
//!
//! Loaded from a JSON file; every field is optional.
//!
//! ```json
//! {"default_connection": "default", "primary_key": "id", "dialect": "postgres",
//!  "max_per_page": 1000, "json_path_separator": "->"}
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::Dialect;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Connection used when an operation names none (default: "default")
    #[serde(default = "default_connection")]
    pub default_connection: String,

    /// Default cursor column and cursor tie-break (default: "id")
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Dialect used unless the store imposes one (default: postgres)
    #[serde(default)]
    pub dialect: Dialect,

    /// Upper bound on `per_page` / `limit` (default: 1000)
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u64,

    /// Attribute path separator (default: "->")
    #[serde(default = "default_json_path_separator")]
    pub json_path_separator: String,
}

fn default_connection() -> String {
    "default".to_string()
}

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_max_per_page() -> u64 {
    1000
}

fn default_json_path_separator() -> String {
    "->".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_connection: default_connection(),
            primary_key: default_primary_key(),
            dialect: Dialect::default(),
            max_per_page: default_max_per_page(),
            json_path_separator: default_json_path_separator(),
        }
    }
}

impl ExecutorConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ExecutorConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_connection.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_connection must not be empty".into(),
            ));
        }
        if self.primary_key.trim().is_empty() {
            return Err(ConfigError::Invalid("primary_key must not be empty".into()));
        }
        if self.json_path_separator.is_empty() {
            return Err(ConfigError::Invalid(
                "json_path_separator must not be empty".into(),
            ));
        }
        if self.max_per_page == 0 {
            return Err(ConfigError::Invalid("max_per_page must be > 0".into()));
        }
        Ok(())
    }

    /// Resolve a descriptor's connection, falling back to the default
    pub fn connection<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested.map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => &self.default_connection,
        }
    }
}
