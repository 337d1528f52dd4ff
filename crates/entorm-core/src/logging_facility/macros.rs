//! Canonical logging macros
//!
//! Expansion refers to `entorm_core_types::schema`, so callers must depend
//! on `entorm-core-types` directly.

/// Log the start of an operation
///
/// ```
/// # use entorm_core::log_op_start;
/// log_op_start!("add");
/// log_op_start!("add", table = "MainTable");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = entorm_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = entorm_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// ```
/// # use entorm_core::log_op_end;
/// log_op_end!("add", duration_ms = 3);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = entorm_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = entorm_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation error
///
/// ```
/// # use entorm_core::log_op_error;
/// # use entorm_core::errors::{OrmError, OrmErrorKind};
/// let err = OrmError::new(OrmErrorKind::RecordNotFound);
/// log_op_error!("refresh", &err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let orm_err: &$crate::errors::OrmError = $err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = entorm_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?orm_err.kind(),
            err_code = orm_err.code(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let orm_err: &$crate::errors::OrmError = $err;
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = entorm_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?orm_err.kind(),
            err_code = orm_err.code(),
            $($field)*
        );
    }};
}
