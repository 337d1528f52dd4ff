//! Repositories
//!
//! - [`CrudRepository`]: translated CRUD plus identity-or-unique-key merge
//! - [`JoinRepository`]: link rows of one many-to-many association
//! - [`PersistRepository`]: cascades over an owner's collections
//!
//! Repositories own the boundary events of every public operation.

#![allow(clippy::result_large_err)]

pub mod crud;
pub mod join;
pub mod persist;

pub use crud::CrudRepository;
pub use join::JoinRepository;
pub use persist::PersistRepository;

use crate::errors::Result;
use entorm_core::{log_op_end, log_op_error, log_op_start};
use rusqlite::Connection;
use std::any::Any;
use std::time::Instant;

/// Run `f` between start and end/error events of `op`
pub(crate) fn scoped<R>(op: &'static str, table: &str, f: impl FnOnce() -> Result<R>) -> Result<R> {
    log_op_start!(op, table = table);
    let start = Instant::now();
    match f() {
        Ok(result) => {
            log_op_end!(
                op,
                duration_ms = start.elapsed().as_millis() as u64,
                table = table
            );
            Ok(result)
        }
        Err(err) => {
            let err = match err.op() {
                None | Some("sqlite") => err.with_op(op),
                Some(_) => err,
            };
            log_op_error!(
                op,
                &err,
                duration_ms = start.elapsed().as_millis() as u64,
                table = table
            );
            Err(err)
        }
    }
}

/// Type-erased CRUD surface a cascade drives for embedded elements
pub(crate) trait CascadeTarget: Send + Sync {
    fn cascade_id(&self, element: &(dyn Any + Send)) -> Result<Option<i64>>;

    fn cascade_add(&self, conn: &Connection, element: &mut (dyn Any + Send)) -> Result<()>;

    fn cascade_update(&self, conn: &Connection, element: &(dyn Any + Send)) -> Result<()>;

    fn cascade_merge(&self, conn: &Connection, element: &mut (dyn Any + Send)) -> Result<()>;

    fn cascade_refresh(&self, conn: &Connection, element: &mut (dyn Any + Send)) -> Result<()>;

    fn cascade_clear_id(&self, element: &mut (dyn Any + Send)) -> Result<()>;

    fn cascade_get(&self, conn: &Connection, id: i64) -> Result<Option<Box<dyn Any + Send>>>;
}
