//! Environment configuration
//!
//! Every field is defaulted, so an empty document describes a private
//! in-memory database created on first start.

use crate::errors::{from_io, from_toml, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the environment treats existing tables on start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    /// Create missing tables, keep existing ones
    #[default]
    CreateIfNotExists,
    /// Drop every registered table, then create
    DropAndCreate,
    /// Touch no table
    Open,
}

/// Where the database lives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Private shared-cache database, alive as long as its data source
    #[default]
    Memory,
    /// Database file; parent directories are created
    File { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    pub connection: ConnectionKind,
    pub foreign_keys: bool,
    pub case_sensitive_like: bool,
    pub busy_timeout_ms: u64,
    /// Write-ahead journal; ignored for in-memory databases
    pub wal: bool,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionKind::Memory,
            foreign_keys: true,
            case_sensitive_like: false,
            busy_timeout_ms: 5000,
            wal: false,
        }
    }
}

impl DataSourceConfig {
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            connection: ConnectionKind::File { path: path.into() },
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub data_source: DataSourceConfig,
    pub start_mode: StartMode,
    /// Keep statement line breaks in debug logs
    pub format_sql: bool,
}

impl EnvironmentConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(from_toml)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| from_io("load_config", e))?;
        tracing::debug!(path = %path.display(), "environment config read");
        Self::from_toml_str(&text)
    }
}
