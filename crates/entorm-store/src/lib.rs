//! entorm store - SQLite execution layer
//!
//! - Data sources and configuration ([`datasource`], [`config`])
//! - Per-entity executor and lazy scans ([`dao`], [`cursor`])
//! - CRUD, join and cascading repositories ([`repo`])
//! - Two-pass registry and environment lifecycle ([`registry`], [`environment`])
//! - Schema management ([`manager`])

pub mod config;
pub mod cursor;
pub mod dao;
pub mod datasource;
pub mod environment;
pub mod errors;
pub mod manager;
pub mod registry;
pub mod repo;
pub(crate) mod row;

// Re-export key types
pub use config::{ConnectionKind, DataSourceConfig, EnvironmentConfig, StartMode};
pub use cursor::EntityCursor;
pub use dao::{Dao, DaoOptions};
pub use datasource::{ConnectionProvider, DataSource};
pub use environment::{Environment, EnvironmentBuilder};
pub use errors::Result;
pub use registry::{Registry, RegistryBuilder, WiredRegistry};
pub use repo::{CrudRepository, JoinRepository, PersistRepository};
