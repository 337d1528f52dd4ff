//! CRUD repository
//!
//! Translates store violations into the domain taxonomy exactly once:
//! primary-key and unique violations become `RecordExists`, foreign-key
//! violations `ForeignKey`, and a refresh of a missing row `RecordNotFound`.

#![allow(clippy::result_large_err)]

use super::{scoped, CascadeTarget};
use crate::cursor::EntityCursor;
use crate::dao::Dao;
use crate::errors::{internal, translate_violation, Result};
use entorm_core::profile::ColumnDef;
use entorm_core::{Entity, EntityError, OrmError, OrmErrorKind, Value};
use rusqlite::Connection;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

pub struct CrudRepository<T: Entity> {
    dao: Arc<Dao<T>>,
}

impl<T: Entity> CrudRepository<T> {
    pub fn new(dao: Arc<Dao<T>>) -> Self {
        Self { dao }
    }

    pub fn dao(&self) -> &Arc<Dao<T>> {
        &self.dao
    }

    pub fn table_name(&self) -> &str {
        self.dao.table_name()
    }

    /// Insert; the generated id is copied into `value`
    pub fn add(&self, value: &mut T) -> Result<()> {
        scoped("add", self.table_name(), || self.add_in(&self.dao.acquire()?, value))
    }

    pub fn add_all(&self, values: &mut [T]) -> Result<usize> {
        scoped("add_all", self.table_name(), || {
            let conn = self.dao.acquire()?;
            for value in values.iter_mut() {
                self.add_in(&conn, value)?;
            }
            Ok(values.len())
        })
    }

    pub fn get(&self, id: i64) -> Result<Option<T>> {
        scoped("get", self.table_name(), || self.get_in(&self.dao.acquire()?, id))
    }

    /// Stored row matching every non-id column of `value`
    pub fn get_by_entity(&self, value: &T) -> Result<Option<T>> {
        scoped("get_by_entity", self.table_name(), || {
            self.dao.read_by_natural_key(value)
        })
    }

    pub fn get_all(&self) -> Result<EntityCursor<T>> {
        scoped("get_all", self.table_name(), || self.dao.read_all())
    }

    /// Full-row update; the value must carry the id of a stored row
    pub fn update(&self, value: &T) -> Result<()> {
        scoped("update", self.table_name(), || self.update_in(&self.dao.acquire()?, value))
    }

    pub fn update_field(&self, id: i64, field_name: &str, value: impl Into<Value>) -> Result<usize> {
        let value = value.into();
        scoped("update_field", self.table_name(), || {
            self.dao
                .update_field(id, field_name, value)
                .map_err(|e| self.translate("update_field", e, &id))
        })
    }

    /// Insert when the value has no id or its id is not stored, else update
    pub fn add_or_update(&self, value: &mut T) -> Result<()> {
        scoped("add_or_update", self.table_name(), || {
            let conn = self.dao.acquire()?;
            let stored = match self.dao.profile().id_of(value) {
                Some(id) => self.dao.read_in(&conn, id)?,
                None => None,
            };
            match stored {
                Some(_) => self.update_in(&conn, value),
                None => self.add_in(&conn, value),
            }
        })
    }

    /// Upsert by identity, then by unique columns, then by unique constraints
    ///
    /// A match has its id copied into `value` and fills every NULL field of
    /// `value` before the full update. Without a match `value` is inserted.
    pub fn merge(&self, value: &mut T) -> Result<()> {
        scoped("merge", self.table_name(), || self.merge_in(&self.dao.acquire()?, value))
    }

    pub fn delete(&self, id: i64) -> Result<usize> {
        scoped("delete", self.table_name(), || {
            self.dao.delete(id).map_err(|e| self.translate("delete", e, &id))
        })
    }

    pub fn delete_all(&self, where_fragment: &str, args: &[Value]) -> Result<usize> {
        scoped("delete_all", self.table_name(), || {
            self.dao
                .delete_all(where_fragment, args)
                .map_err(|e| self.translate("delete_all", e, &args))
        })
    }

    /// Reload `value` from its stored row; `RecordNotFound` when absent
    pub fn refresh(&self, value: &mut T) -> Result<()> {
        scoped("refresh", self.table_name(), || self.refresh_in(&self.dao.acquire()?, value))
    }

    pub fn find_by_unique(&self, name: &str, value: impl Into<Value>) -> Result<Option<T>> {
        let value = value.into();
        scoped("find_by_unique", self.table_name(), || {
            self.dao.find_by_unique(name, value)
        })
    }

    pub fn find_by_unique_columns(&self, names: &[&str], values: &[Value]) -> Result<Option<T>> {
        scoped("find_by_unique_columns", self.table_name(), || {
            self.dao.find_by_unique_columns(names, values)
        })
    }

    pub fn find_all(&self, where_fragment: &str, args: &[Value]) -> Result<Vec<T>> {
        scoped("find_all", self.table_name(), || self.dao.find_all(where_fragment, args))
    }

    pub fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<T>> {
        scoped("query", self.table_name(), || self.dao.query(sql, args))
    }

    // ===== Connection-scoped twins used by cascades =====

    pub(crate) fn add_in(&self, conn: &Connection, value: &mut T) -> Result<()> {
        match self.dao.create_in(conn, value) {
            Ok(_) => Ok(()),
            Err(e) => Err(self.translate("add", e, &*value)),
        }
    }

    pub(crate) fn get_in(&self, conn: &Connection, id: i64) -> Result<Option<T>> {
        self.dao.read_in(conn, id)
    }

    pub(crate) fn update_in(&self, conn: &Connection, value: &T) -> Result<()> {
        if self.dao.profile().id_of(value).is_none() {
            return Err(self.missing_identity(value));
        }
        let count = self
            .dao
            .update_in(conn, value)
            .map_err(|e| self.translate("update", e, value))?;
        if count == 0 && self.dao.profile().statements().update_by_id.is_some() {
            return Err(OrmError::new(OrmErrorKind::RecordNotFound)
                .with_op("update")
                .with_table(self.table_name())
                .with_message("no stored row with this id")
                .with_entity(value));
        }
        Ok(())
    }

    pub(crate) fn refresh_in(&self, conn: &Connection, value: &mut T) -> Result<()> {
        if self.dao.refresh_in(conn, value)? == 0 {
            return Err(OrmError::new(OrmErrorKind::RecordNotFound)
                .with_op("refresh")
                .with_table(self.table_name())
                .with_message("no stored row with this id")
                .with_entity(&*value));
        }
        Ok(())
    }

    pub(crate) fn merge_in(&self, conn: &Connection, value: &mut T) -> Result<()> {
        let profile = self.dao.profile();

        if let Some(id) = profile.id_of(value) {
            if let Some(stored) = self.dao.read_in(conn, id)? {
                profile.enrich(value, &stored)?;
                return self.update_in(conn, value);
            }
        }

        match self.find_merge_match_in(conn, value)? {
            Some(stored) => {
                let id = profile
                    .id_of(&stored)
                    .ok_or_else(|| internal("stored row without id").with_table(self.table_name()))?;
                profile.set_id(value, id)?;
                profile.enrich(value, &stored)?;
                self.update_in(conn, value)
            }
            None => self.add_in(conn, value),
        }
    }

    /// First stored row sharing a unique single column, then a composite
    /// constraint, with `value`; NULL keys never match
    fn find_merge_match_in(&self, conn: &Connection, value: &T) -> Result<Option<T>> {
        let profile = self.dao.profile();
        let schema = profile.schema();

        for column in schema.unique_columns() {
            let key = profile.get(column, value);
            if key.is_null() {
                continue;
            }
            if let Some(stored) = self.dao.find_unique_in(conn, &[column], &[key])? {
                tracing::debug!(table = self.table_name(), column = %column.column_name, "merge matched unique column");
                return Ok(Some(stored));
            }
        }

        for constraint in schema.unique_constraints() {
            let columns: Vec<&ColumnDef> = constraint
                .columns
                .iter()
                .filter_map(|name| schema.column_by_name(name))
                .collect();
            let keys = profile.values(value, columns.iter().copied());
            if keys.iter().any(Value::is_null) {
                continue;
            }
            if let Some(stored) = self.dao.find_unique_in(conn, &columns, &keys)? {
                tracing::debug!(table = self.table_name(), columns = ?constraint.columns, "merge matched unique constraint");
                return Ok(Some(stored));
            }
        }

        Ok(None)
    }

    fn translate(&self, op: &'static str, err: OrmError, value: &dyn Debug) -> OrmError {
        let err = translate_violation(err).with_op(op);
        match err.kind() {
            OrmErrorKind::RecordExists | OrmErrorKind::ForeignKey => err.with_entity(value),
            _ => err,
        }
    }

    fn missing_identity(&self, value: &T) -> OrmError {
        OrmError::from(EntityError::MissingIdentity {
            table: self.table_name().to_string(),
        })
        .with_entity(value)
    }

    fn typed<'a>(&self, element: &'a (dyn Any + Send)) -> Result<&'a T> {
        element.downcast_ref::<T>().ok_or_else(|| self.foreign_element())
    }

    fn typed_mut<'a>(&self, element: &'a mut (dyn Any + Send)) -> Result<&'a mut T> {
        match element.downcast_mut::<T>() {
            Some(value) => Ok(value),
            None => Err(self.foreign_element()),
        }
    }

    fn foreign_element(&self) -> OrmError {
        internal(format!(
            "cascade element is not a {}",
            self.dao.profile().type_name()
        ))
        .with_table(self.table_name())
    }
}

impl<T: Entity> CascadeTarget for CrudRepository<T> {
    fn cascade_id(&self, element: &(dyn Any + Send)) -> Result<Option<i64>> {
        Ok(self.dao.profile().id_of(self.typed(element)?))
    }

    fn cascade_add(&self, conn: &Connection, element: &mut (dyn Any + Send)) -> Result<()> {
        let value = self.typed_mut(element)?;
        self.add_in(conn, value)
    }

    fn cascade_update(&self, conn: &Connection, element: &(dyn Any + Send)) -> Result<()> {
        self.update_in(conn, self.typed(element)?)
    }

    fn cascade_merge(&self, conn: &Connection, element: &mut (dyn Any + Send)) -> Result<()> {
        let value = self.typed_mut(element)?;
        self.merge_in(conn, value)
    }

    fn cascade_refresh(&self, conn: &Connection, element: &mut (dyn Any + Send)) -> Result<()> {
        let value = self.typed_mut(element)?;
        self.refresh_in(conn, value)
    }

    fn cascade_clear_id(&self, element: &mut (dyn Any + Send)) -> Result<()> {
        let value = self.typed_mut(element)?;
        self.dao.profile().clear_id(value)
    }

    fn cascade_get(&self, conn: &Connection, id: i64) -> Result<Option<Box<dyn Any + Send>>> {
        Ok(self
            .get_in(conn, id)?
            .map(|value| Box::new(value) as Box<dyn Any + Send>))
    }
}

impl<T: Entity> Debug for CrudRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrudRepository")
            .field("table", &self.table_name())
            .finish()
    }
}
