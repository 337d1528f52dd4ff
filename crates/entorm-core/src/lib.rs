//! entorm core - store-agnostic mapping kernel
//!
//! - Entity mapping through typed accessors ([`mapping`])
//! - Profile derivation and join-table synthesis ([`profile`])
//! - Deterministic statement text ([`statement`], [`dialect`])
//! - The canonical error and logging facilities

pub mod dialect;
pub mod errors;
pub mod logging_facility;
pub mod mapping;
pub mod profile;
pub mod statement;

// Re-export commonly used types
pub use errors::{EntityError, OrmError, OrmErrorKind, Result};
pub use mapping::{ColumnOptions, Entity, Field, JoinColumn, JoinTable, Mapping};
pub use profile::{derive_profile, JoinRow, Profile, TableSchema};

pub use entorm_core_types::{Value, ValueType};
