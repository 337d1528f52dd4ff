//! Connection provisioning
//!
//! Every executor call acquires its own connection from a
//! [`ConnectionProvider`] and drops it on return.

#![allow(clippy::result_large_err)]

use crate::config::{ConnectionKind, DataSourceConfig};
use crate::errors::{from_io, from_rusqlite, Result};
use rusqlite::{Connection, OpenFlags};
use std::sync::Mutex;
use std::time::Duration;

/// Hands out one independent connection per call
pub trait ConnectionProvider: Send + Sync {
    fn acquire(&self) -> Result<Connection>;

    /// Location shown in logs
    fn url(&self) -> &str;
}

/// SQLite data source configured from a [`DataSourceConfig`]
pub struct DataSource {
    url: String,
    config: DataSourceConfig,
    // An in-memory database lives as long as one connection to it is open
    keep_alive: Option<Mutex<Connection>>,
}

impl DataSource {
    pub fn open(config: DataSourceConfig) -> Result<Self> {
        let (url, memory) = match &config.connection {
            ConnectionKind::Memory => (
                format!("file:entorm-{}?mode=memory&cache=shared", uuid::Uuid::new_v4()),
                true,
            ),
            ConnectionKind::File { path } => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| from_io("open_data_source", e))?;
                }
                (path.to_string_lossy().into_owned(), false)
            }
        };

        let mut source = Self {
            url,
            config,
            keep_alive: None,
        };
        let first = source.acquire()?;
        if memory {
            source.keep_alive = Some(Mutex::new(first));
        } else if source.config.wal {
            let mode: String = first
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                .map_err(from_rusqlite)?;
            tracing::debug!(url = %source.url, journal_mode = %mode, "journal mode set");
        }

        tracing::info!(url = %source.url, "data source opened");
        Ok(source)
    }

    /// A fresh private in-memory database
    pub fn in_memory() -> Result<Self> {
        Self::open(DataSourceConfig::memory())
    }

    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    fn configure(&self, conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "foreign_keys", self.config.foreign_keys)
            .map_err(from_rusqlite)?;
        conn.pragma_update(None, "case_sensitive_like", self.config.case_sensitive_like)
            .map_err(from_rusqlite)?;
        conn.busy_timeout(Duration::from_millis(self.config.busy_timeout_ms))
            .map_err(from_rusqlite)?;
        Ok(())
    }
}

impl ConnectionProvider for DataSource {
    fn acquire(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(&self.url, OpenFlags::default()).map_err(from_rusqlite)?;
        self.configure(&conn)?;
        Ok(conn)
    }

    fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for DataSource {
    fn drop(&mut self) {
        if self.keep_alive.take().is_some() {
            tracing::info!(url = %self.url, "in-memory data source released");
        }
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("url", &self.url)
            .field("config", &self.config)
            .finish()
    }
}
