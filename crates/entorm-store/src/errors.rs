//! Error handling for entorm-store
//!
//! Constructors that turn rusqlite, IO and TOML failures into `OrmError`

use entorm_core::errors::{OrmError, OrmErrorKind};
use rusqlite::ffi;

/// Result type alias using OrmError
pub type Result<T> = std::result::Result<T, OrmError>;

/// Create a store error from rusqlite::Error, keeping the extended result code
pub fn from_rusqlite(err: rusqlite::Error) -> OrmError {
    let error = OrmError::new(OrmErrorKind::Persistence)
        .with_op("sqlite")
        .with_message(err.to_string());
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) => error.with_store_code(failure.extended_code),
        _ => error,
    }
}

/// Create an IO error
pub fn from_io(operation: &str, err: std::io::Error) -> OrmError {
    OrmError::new(OrmErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}

/// Create a configuration-file error
pub fn from_toml(err: toml::de::Error) -> OrmError {
    OrmError::new(OrmErrorKind::Configuration)
        .with_op("load_config")
        .with_message(err.to_string())
}

/// Create an internal error
pub fn internal(message: impl Into<String>) -> OrmError {
    OrmError::new(OrmErrorKind::Internal).with_message(message)
}

/// Reclassify a constraint violation into the domain taxonomy
///
/// Primary-key and unique violations become `RecordExists`, foreign-key
/// violations become `ForeignKey`. Anything else is returned unchanged.
pub fn translate_violation(err: OrmError) -> OrmError {
    match err.store_code() {
        Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY) | Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => {
            err.with_kind(OrmErrorKind::RecordExists)
        }
        Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => err.with_kind(OrmErrorKind::ForeignKey),
        _ => err,
    }
}
