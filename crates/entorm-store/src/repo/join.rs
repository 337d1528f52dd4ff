//! Join repository over one synthesized link table

#![allow(clippy::result_large_err)]

use super::{scoped, CrudRepository};
use crate::dao::Dao;
use crate::errors::Result;
use entorm_core::profile::ColumnDef;
use entorm_core::statement::quote_identifier;
use entorm_core::{JoinRow, OrmErrorKind, Value};
use rusqlite::Connection;
use std::sync::Arc;

/// Link rows between owners and embedded elements
///
/// Rows of one owner come back in insertion order, which is the element
/// order of a sequence container.
#[derive(Debug)]
pub struct JoinRepository {
    crud: CrudRepository<JoinRow>,
}

impl JoinRepository {
    pub fn new(dao: Arc<Dao<JoinRow>>) -> Self {
        Self {
            crud: CrudRepository::new(dao),
        }
    }

    pub fn crud(&self) -> &CrudRepository<JoinRow> {
        &self.crud
    }

    pub fn table_name(&self) -> &str {
        self.crud.table_name()
    }

    /// Insert one link row and return it with its id
    pub fn create_entity(&self, owner_id: i64, embedded_id: i64) -> Result<JoinRow> {
        let mut row = JoinRow::new(owner_id, embedded_id);
        self.crud.add(&mut row)?;
        Ok(row)
    }

    /// Link `owner_id` to `embedded_id`; an existing link is kept
    pub fn link(&self, owner_id: i64, embedded_id: i64) -> Result<()> {
        scoped("link", self.table_name(), || {
            self.link_in(&self.crud.dao().acquire()?, owner_id, embedded_id)
        })
    }

    pub fn find_all_embedded(&self, owner_id: i64) -> Result<Vec<JoinRow>> {
        scoped("find_all_embedded", self.table_name(), || {
            self.find_all_embedded_in(&self.crud.dao().acquire()?, owner_id)
        })
    }

    pub fn find_all_owners(&self, embedded_id: i64) -> Result<Vec<JoinRow>> {
        scoped("find_all_owners", self.table_name(), || {
            let column = JoinRow::embedded_column(self.schema())?;
            self.crud
                .dao()
                .find_all(&self.ordered_by(column), &[Value::Integer(embedded_id)])
        })
    }

    /// Remove every link of `owner_id`
    pub fn delete_all_embedded(&self, owner_id: i64) -> Result<usize> {
        scoped("delete_all_embedded", self.table_name(), || {
            self.delete_all_embedded_in(&self.crud.dao().acquire()?, owner_id)
        })
    }

    pub(crate) fn link_in(&self, conn: &Connection, owner_id: i64, embedded_id: i64) -> Result<()> {
        let mut row = JoinRow::new(owner_id, embedded_id);
        match self.crud.add_in(conn, &mut row) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == OrmErrorKind::RecordExists => {
                tracing::debug!(
                    table = self.table_name(),
                    owner_id,
                    embedded_id,
                    "link already present"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) fn find_all_embedded_in(&self, conn: &Connection, owner_id: i64) -> Result<Vec<JoinRow>> {
        let column = JoinRow::owner_column(self.schema())?;
        self.crud
            .dao()
            .find_all_in(conn, &self.ordered_by(column), &[Value::Integer(owner_id)])
    }

    pub(crate) fn delete_all_embedded_in(&self, conn: &Connection, owner_id: i64) -> Result<usize> {
        let column = JoinRow::owner_column(self.schema())?;
        self.crud.dao().delete_all_in(
            conn,
            &format!("{}=?", quote_identifier(&column.column_name)),
            &[Value::Integer(owner_id)],
        )
    }

    fn schema(&self) -> &entorm_core::TableSchema {
        self.crud.dao().profile().schema()
    }

    fn ordered_by(&self, column: &ColumnDef) -> String {
        format!(
            "{}=? ORDER BY {}",
            quote_identifier(&column.column_name),
            quote_identifier(&self.schema().id_column().column_name)
        )
    }
}
