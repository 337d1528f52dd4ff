//! Entity executor
//!
//! Binds profile-derived statements, executes them on a connection from the
//! provider and hydrates result rows. Store violations surface untranslated
//! as `Persistence` errors carrying the SQLite extended code; repositories
//! translate them.
//!
//! Every public method acquires its own connection. The `*_in` twins run on
//! a caller-supplied connection so a cascade can share one transaction.

#![allow(clippy::result_large_err)]

use crate::cursor::EntityCursor;
use crate::datasource::ConnectionProvider;
use crate::errors::{from_rusqlite, Result};
use crate::row::{binds, check_parameter_count, check_projection, hydrate};
use entorm_core::profile::ColumnDef;
use entorm_core::statement::{
    build_delete_all, build_find_all, build_find_by_columns, build_read_by_natural_key_with_nulls,
    build_update_field,
};
use entorm_core::{Entity, EntityError, OrmError, Profile, Value};
use rusqlite::{params_from_iter, Connection};
use std::sync::Arc;

/// Executor options shared by every DAO of a registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaoOptions {
    /// Keep statement line breaks in debug logs
    pub format_sql: bool,
}

pub struct Dao<T: Entity> {
    profile: Arc<Profile<T>>,
    provider: Arc<dyn ConnectionProvider>,
    options: DaoOptions,
}

impl<T: Entity> Dao<T> {
    pub fn new(profile: Arc<Profile<T>>, provider: Arc<dyn ConnectionProvider>, options: DaoOptions) -> Self {
        Self {
            profile,
            provider,
            options,
        }
    }

    pub fn profile(&self) -> &Arc<Profile<T>> {
        &self.profile
    }

    pub fn table_name(&self) -> &str {
        self.profile.table_name()
    }

    pub fn provider(&self) -> &Arc<dyn ConnectionProvider> {
        &self.provider
    }

    pub(crate) fn acquire(&self) -> Result<Connection> {
        self.provider.acquire()
    }

    /// Insert `value`; a generated id is copied back into it
    pub fn create(&self, value: &mut T) -> Result<usize> {
        self.create_in(&self.acquire()?, value)
    }

    /// Insert every value sequentially on one connection
    pub fn create_all(&self, values: &mut [T]) -> Result<usize> {
        let conn = self.acquire()?;
        let mut count = 0;
        for value in values.iter_mut() {
            count += self.create_in(&conn, value)?;
        }
        Ok(count)
    }

    pub fn read(&self, id: i64) -> Result<Option<T>> {
        self.read_in(&self.acquire()?, id)
    }

    /// First row whose non-id columns equal the value's; NULL fields match `IS NULL`
    pub fn read_by_natural_key(&self, value: &T) -> Result<Option<T>> {
        self.read_by_natural_key_in(&self.acquire()?, value)
    }

    /// Lazy scan of the whole table over a dedicated connection
    pub fn read_all(&self) -> Result<EntityCursor<T>> {
        let sql = self.profile.statements().read_all.clone();
        self.log_sql(&sql);
        EntityCursor::open(self.acquire()?, Arc::clone(&self.profile), sql)
    }

    pub fn update(&self, value: &T) -> Result<usize> {
        self.update_in(&self.acquire()?, value)
    }

    /// Single-column update by id, bypassing the full-row statement
    pub fn update_field(&self, id: i64, field_name: &str, value: impl Into<Value>) -> Result<usize> {
        self.update_field_in(&self.acquire()?, id, field_name, value.into())
    }

    pub fn delete(&self, id: i64) -> Result<usize> {
        self.delete_in(&self.acquire()?, id)
    }

    /// Delete rows matching a WHERE fragment
    pub fn delete_all(&self, where_fragment: &str, args: &[Value]) -> Result<usize> {
        self.delete_all_in(&self.acquire()?, where_fragment, args)
    }

    /// Reload every scalar of `value` from its stored row; 0 when absent
    pub fn refresh(&self, value: &mut T) -> Result<usize> {
        self.refresh_in(&self.acquire()?, value)
    }

    pub fn find_all(&self, where_fragment: &str, args: &[Value]) -> Result<Vec<T>> {
        self.find_all_in(&self.acquire()?, where_fragment, args)
    }

    /// Lookup by one column, by column or field name
    ///
    /// More than one matching row means the column is not a key and fails
    /// with `InvalidArgument`.
    pub fn find_by_unique(&self, name: &str, value: impl Into<Value>) -> Result<Option<T>> {
        let column = self.lookup_column(name)?;
        let value = value.into();
        self.find_unique_in(&self.acquire()?, &[column], std::slice::from_ref(&value))
    }

    /// Lookup by several columns; more than one matching row fails
    pub fn find_by_unique_columns(&self, names: &[&str], values: &[Value]) -> Result<Option<T>> {
        if names.len() != values.len() {
            return Err(EntityError::ColumnValueMismatch {
                columns: names.len(),
                values: values.len(),
            }
            .into());
        }
        let columns = names
            .iter()
            .map(|name| self.lookup_column(name))
            .collect::<Result<Vec<_>>>()?;
        self.find_unique_in(&self.acquire()?, &columns, values)
    }

    /// Raw SQL; the projection must cover every column of the entity
    pub fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<T>> {
        self.select_in(&self.acquire()?, sql, args)
    }

    // ===== Connection-scoped twins =====

    pub(crate) fn create_in(&self, conn: &Connection, value: &mut T) -> Result<usize> {
        let values = self
            .profile
            .values(value, self.profile.schema().insertable_columns());
        let count = self.execute_in(conn, &self.profile.statements().insert, &values)?;
        if count > 0 && self.profile.id_of(value).is_none() {
            self.profile.set_id(value, conn.last_insert_rowid())?;
        }
        Ok(count)
    }

    pub(crate) fn read_in(&self, conn: &Connection, id: i64) -> Result<Option<T>> {
        let rows = self.select_in(conn, &self.profile.statements().read_by_id, &[Value::Integer(id)])?;
        Ok(rows.into_iter().next())
    }

    pub(crate) fn read_by_natural_key_in(&self, conn: &Connection, value: &T) -> Result<Option<T>> {
        let values = self
            .profile
            .values(value, self.profile.schema().natural_key_columns());
        let nulls: Vec<bool> = values.iter().map(Value::is_null).collect();
        let sql = build_read_by_natural_key_with_nulls(self.profile.schema(), &nulls);
        let args: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();
        Ok(self.select_in(conn, &sql, &args)?.into_iter().next())
    }

    pub(crate) fn update_in(&self, conn: &Connection, value: &T) -> Result<usize> {
        let Some(sql) = self.profile.statements().update_by_id.as_deref() else {
            return Ok(0);
        };
        let mut values = self
            .profile
            .values(value, self.profile.schema().updatable_columns());
        values.push(self.profile.get(self.profile.schema().id_column(), value));
        self.execute_in(conn, sql, &values)
    }

    pub(crate) fn update_field_in(&self, conn: &Connection, id: i64, field_name: &str, value: Value) -> Result<usize> {
        let schema = self.profile.schema();
        let column = schema.column_by_field(field_name).ok_or_else(|| {
            OrmError::from(EntityError::UnknownField {
                table: self.table_name().to_string(),
                field: field_name.to_string(),
            })
        })?;
        if !column.is_scalar() {
            return Err(EntityError::NotScalar {
                table: self.table_name().to_string(),
                field: field_name.to_string(),
            }
            .into());
        }
        let sql = build_update_field(schema, column);
        self.execute_in(conn, &sql, &[value, Value::Integer(id)])
    }

    pub(crate) fn delete_in(&self, conn: &Connection, id: i64) -> Result<usize> {
        self.execute_in(conn, &self.profile.statements().delete_by_id, &[Value::Integer(id)])
    }

    pub(crate) fn delete_all_in(&self, conn: &Connection, where_fragment: &str, args: &[Value]) -> Result<usize> {
        let sql = build_delete_all(self.profile.schema(), where_fragment);
        self.execute_in(conn, &sql, args)
    }

    pub(crate) fn refresh_in(&self, conn: &Connection, value: &mut T) -> Result<usize> {
        let Some(id) = self.profile.id_of(value) else {
            return Err(EntityError::MissingIdentity {
                table: self.table_name().to_string(),
            }
            .into());
        };
        match self.read_in(conn, id)? {
            Some(stored) => {
                self.profile.copy_into(&stored, value)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    pub(crate) fn find_all_in(&self, conn: &Connection, where_fragment: &str, args: &[Value]) -> Result<Vec<T>> {
        let sql = build_find_all(self.profile.schema(), where_fragment);
        self.select_in(conn, &sql, args)
    }

    /// At most one row matching `columns`; several is a caller error
    pub(crate) fn find_unique_in(&self, conn: &Connection, columns: &[&ColumnDef], values: &[Value]) -> Result<Option<T>> {
        let sql = build_find_by_columns(self.profile.schema(), columns);
        let mut rows = self.select_in(conn, &sql, values)?;
        if rows.len() > 1 {
            return Err(self.not_unique(columns));
        }
        Ok(rows.pop())
    }

    pub(crate) fn select_in(&self, conn: &Connection, sql: &str, args: &[Value]) -> Result<Vec<T>> {
        self.log_sql(sql);
        let mut stmt = conn.prepare(sql).map_err(|e| self.store_error(e, sql))?;
        check_parameter_count(&stmt, args.len())?;
        check_projection(&stmt, &*self.profile)?;
        let mut rows = stmt
            .query(params_from_iter(binds(args)))
            .map_err(|e| self.store_error(e, sql))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(|e| self.store_error(e, sql))? {
            result.push(hydrate(&*self.profile, row)?);
        }
        Ok(result)
    }

    pub(crate) fn execute_in(&self, conn: &Connection, sql: &str, args: &[Value]) -> Result<usize> {
        self.log_sql(sql);
        let mut stmt = conn.prepare(sql).map_err(|e| self.store_error(e, sql))?;
        check_parameter_count(&stmt, args.len())?;
        stmt.execute(params_from_iter(binds(args)))
            .map_err(|e| self.store_error(e, sql))
    }

    // ===== Helpers =====

    fn lookup_column(&self, name: &str) -> Result<&ColumnDef> {
        let schema = self.profile.schema();
        schema
            .column_by_name(name)
            .or_else(|| schema.column_by_field(name))
            .filter(|c| c.is_scalar())
            .ok_or_else(|| {
                EntityError::UnknownColumn {
                    table: self.table_name().to_string(),
                    column: name.to_string(),
                }
                .into()
            })
    }

    fn not_unique(&self, columns: &[&ColumnDef]) -> OrmError {
        EntityError::NotUnique {
            table: self.table_name().to_string(),
            columns: columns.iter().map(|c| c.column_name.clone()).collect(),
        }
        .into()
    }

    fn store_error(&self, err: rusqlite::Error, sql: &str) -> OrmError {
        from_rusqlite(err).with_table(self.table_name()).with_sql(sql)
    }

    fn log_sql(&self, sql: &str) {
        if self.options.format_sql {
            tracing::debug!(table = self.table_name(), sql = %sql, "executing");
        } else {
            tracing::debug!(table = self.table_name(), sql = %sql.replace('\n', " "), "executing");
        }
    }
}

impl<T: Entity> std::fmt::Debug for Dao<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dao")
            .field("table", &self.table_name())
            .field("url", &self.provider.url())
            .finish()
    }
}
