//! Schema management against the live database

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use entorm_core::statement::{build_create, build_drop};
use entorm_core::TableSchema;
use rusqlite::{Connection, OptionalExtension};

const STORED_CREATE_SQL: &str =
    "SELECT sql FROM sqlite_schema WHERE type = 'table' AND name = ?1 COLLATE NOCASE";

pub fn create_table_if_not_exists(conn: &Connection, schema: &TableSchema) -> Result<()> {
    let sql = build_create(schema, true);
    tracing::debug!(sql = %sql, "create table");
    conn.execute(&sql, []).map_err(|e| {
        from_rusqlite(e)
            .with_op("create_table")
            .with_table(schema.table_name())
            .with_sql(sql.clone())
    })?;
    tracing::info!(table = schema.table_name(), "table ensured");
    Ok(())
}

pub fn drop_table_if_exists(conn: &Connection, schema: &TableSchema) -> Result<()> {
    let sql = build_drop(schema, true);
    conn.execute(&sql, []).map_err(|e| {
        from_rusqlite(e)
            .with_op("drop_table")
            .with_table(schema.table_name())
    })?;
    tracing::info!(table = schema.table_name(), "table dropped");
    Ok(())
}

pub fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    Ok(stored_create_statement(conn, table_name)?.is_some())
}

/// CREATE text recorded by the database for `table_name`
///
/// The database drops any `IF NOT EXISTS` clause when it records the text.
pub fn stored_create_statement(conn: &Connection, table_name: &str) -> Result<Option<String>> {
    conn.query_row(STORED_CREATE_SQL, [table_name], |row| row.get(0))
        .optional()
        .map_err(|e| from_rusqlite(e).with_table(table_name))
}

/// Whether the stored table matches what `schema` would create
pub fn table_equals(conn: &Connection, schema: &TableSchema) -> Result<bool> {
    let Some(stored) = stored_create_statement(conn, schema.table_name())? else {
        return Ok(false);
    };
    Ok(stored.eq_ignore_ascii_case(&build_create(schema, false)))
}
