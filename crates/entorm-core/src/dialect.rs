//! Storage dialects: how semantic column types are spelled in DDL

use entorm_core_types::ValueType;

pub trait Dialect: Send + Sync {
    /// Storage type of a column without a raw definition override
    fn storage_type(&self, value_type: ValueType) -> &'static str;

    /// Marker appended to a generated id column
    fn auto_increment(&self) -> &'static str {
        "AUTOINCREMENT"
    }
}

/// SQLite affinities; booleans are stored as integers
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn storage_type(&self, value_type: ValueType) -> &'static str {
        match value_type {
            ValueType::Text => "TEXT",
            ValueType::Integer | ValueType::Boolean => "INTEGER",
            ValueType::Real => "REAL",
        }
    }
}
