//! Profiles: derived table schema plus typed access for one entity type
//!
//! A [`Profile`] is built once by [`derive_profile`] and is immutable
//! afterwards, except that each many-to-many column accepts exactly one
//! [`JoinLink`] during registry wiring.

#![allow(clippy::result_large_err)]

pub mod factory;
pub mod join;

pub use factory::derive_profile;
pub use join::{synthesize_join, JoinRow};

use crate::errors::{EntityError, Result};
use crate::mapping::field::{AssociationDef, Getter, Setter};
use crate::mapping::{ContainerKind, Elements, GenerationType, JoinTable};
use crate::statement::Statements;
use entorm_core_types::{Value, ValueType};
use std::any::TypeId;
use std::sync::{Arc, OnceLock};

/// Many-to-many metadata recorded on an owner column
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationInfo {
    pub target: &'static str,
    pub container: ContainerKind,
    pub fetch_eager: bool,
    pub join_table: Option<JoinTable>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    Scalar(ValueType),
    ManyToMany(AssociationInfo),
}

/// One mapped field
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub field_name: String,
    pub column_name: String,
    /// 1-based, declaration order with inherited fields first
    pub order: usize,
    pub kind: ColumnKind,
    pub id: bool,
    pub generation: Option<GenerationType>,
    pub insertable: bool,
    pub updatable: bool,
    pub nullable: bool,
    pub unique: bool,
    pub length: u32,
    pub definition: Option<String>,
}

impl ColumnDef {
    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, ColumnKind::Scalar(_))
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match self.kind {
            ColumnKind::Scalar(t) => Some(t),
            ColumnKind::ManyToMany(_) => None,
        }
    }

    pub fn association(&self) -> Option<&AssociationInfo> {
        match &self.kind {
            ColumnKind::ManyToMany(info) => Some(info),
            ColumnKind::Scalar(_) => None,
        }
    }

    fn index(&self) -> usize {
        self.order - 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub reference_table: String,
    pub reference_columns: Vec<String>,
}

/// The store-facing half of a profile: everything statements are built from
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    table_name: String,
    columns: Vec<ColumnDef>,
    id_index: usize,
    unique_constraints: Vec<UniqueConstraint>,
    foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// All columns, many-to-many owners included
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn id_column(&self) -> &ColumnDef {
        &self.columns[self.id_index]
    }

    /// Columns that exist in the table, in order
    pub fn scalar_columns(&self) -> impl Iterator<Item = &ColumnDef> + '_ {
        self.columns.iter().filter(|c| c.is_scalar())
    }

    pub fn insertable_columns(&self) -> impl Iterator<Item = &ColumnDef> + '_ {
        self.scalar_columns().filter(|c| c.insertable)
    }

    /// Updatable columns; the id is the key and never part of the SET list
    pub fn updatable_columns(&self) -> impl Iterator<Item = &ColumnDef> + '_ {
        self.scalar_columns().filter(|c| c.updatable && !c.id)
    }

    /// Every non-id column, the predicate of a natural-key lookup
    pub fn natural_key_columns(&self) -> impl Iterator<Item = &ColumnDef> + '_ {
        self.scalar_columns().filter(|c| !c.id)
    }

    /// Non-id columns flagged unique, in declared order
    pub fn unique_columns(&self) -> impl Iterator<Item = &ColumnDef> + '_ {
        self.scalar_columns().filter(|c| c.unique && !c.id)
    }

    pub fn column_by_field(&self, field_name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.field_name == field_name)
    }

    /// Column names compare case-insensitively, as they do in SQLite
    pub fn column_by_name(&self, column_name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.column_name.eq_ignore_ascii_case(column_name))
    }

    pub fn unique_constraints(&self) -> &[UniqueConstraint] {
        &self.unique_constraints
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }
}

/// Join profile attached to a wired many-to-many column
#[derive(Debug, Clone)]
pub struct JoinLink {
    target_table: String,
    profile: Arc<Profile<JoinRow>>,
}

impl JoinLink {
    pub fn target_table(&self) -> &str {
        &self.target_table
    }

    pub fn profile(&self) -> &Arc<Profile<JoinRow>> {
        &self.profile
    }

    pub fn table_name(&self) -> &str {
        self.profile.table_name()
    }
}

/// Typed view of a many-to-many owner column
pub struct Association<T> {
    def: AssociationDef<T>,
    link: OnceLock<JoinLink>,
}

impl<T> Association<T> {
    pub fn target_type(&self) -> TypeId {
        self.def.target
    }

    pub fn target_name(&self) -> &'static str {
        self.def.target_name
    }

    pub fn container(&self) -> ContainerKind {
        self.def.container
    }

    pub fn is_eager(&self) -> bool {
        self.def.fetch_eager
    }

    pub fn link(&self) -> Option<&JoinLink> {
        self.link.get()
    }

    /// Move the collection out of the owner; `None` when the field is unset
    pub fn take(&self, owner: &mut T) -> Option<Elements> {
        (self.def.take)(owner)
    }

    /// Store elements into the owner's field with its container semantics
    pub fn assign(&self, owner: &mut T, elements: Elements) -> Result<()> {
        (self.def.assign)(owner, elements)?;
        Ok(())
    }
}

impl<T> std::fmt::Debug for Association<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Association")
            .field("target", &self.def.target_name)
            .field("container", &self.def.container)
            .field("link", &self.link.get().map(JoinLink::table_name))
            .finish()
    }
}

pub(crate) enum ColumnAccess<T> {
    Scalar { get: Getter<T>, set: Setter<T> },
    ManyToMany(Association<T>),
}

/// Schema, accessors and cached statements for entity type `T`
pub struct Profile<T> {
    type_name: &'static str,
    schema: TableSchema,
    access: Vec<ColumnAccess<T>>,
    statements: Statements,
}

impl<T: 'static> Profile<T> {
    pub(crate) fn assemble(type_name: &'static str, schema: TableSchema, access: Vec<ColumnAccess<T>>) -> Self {
        let statements = Statements::build(&schema);
        Self {
            type_name,
            schema,
            access,
            statements,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &str {
        self.schema.table_name()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn statements(&self) -> &Statements {
        &self.statements
    }

    /// Read a scalar column; many-to-many columns read as NULL
    pub fn get(&self, column: &ColumnDef, value: &T) -> Value {
        match self.access.get(column.index()) {
            Some(ColumnAccess::Scalar { get, .. }) => get(value),
            _ => Value::Null,
        }
    }

    pub fn set(&self, column: &ColumnDef, target: &mut T, value: Value) -> Result<()> {
        match self.access.get(column.index()) {
            Some(ColumnAccess::Scalar { set, .. }) => Ok(set(target, value)?),
            _ => Err(EntityError::NotScalar {
                table: self.table_name().to_string(),
                field: column.field_name.clone(),
            }
            .into()),
        }
    }

    /// Values of `columns` on `value`, in the given order
    pub fn values<'a>(&self, value: &T, columns: impl Iterator<Item = &'a ColumnDef>) -> Vec<Value> {
        columns.map(|c| self.get(c, value)).collect()
    }

    pub fn id_of(&self, value: &T) -> Option<i64> {
        self.get(self.schema.id_column(), value).as_i64()
    }

    pub fn set_id(&self, target: &mut T, id: i64) -> Result<()> {
        self.set(self.schema.id_column(), target, Value::Integer(id))
    }

    pub fn clear_id(&self, target: &mut T) -> Result<()> {
        self.set(self.schema.id_column(), target, Value::Null)
    }

    /// Fill every NULL scalar of `target` from `stored`
    pub fn enrich(&self, target: &mut T, stored: &T) -> Result<()> {
        for column in self.schema.scalar_columns() {
            if self.get(column, target).is_null() {
                self.set(column, target, self.get(column, stored))?;
            }
        }
        Ok(())
    }

    /// Overwrite every scalar of `target` with the one in `source`
    pub fn copy_into(&self, source: &T, target: &mut T) -> Result<()> {
        for column in self.schema.scalar_columns() {
            self.set(column, target, self.get(column, source))?;
        }
        Ok(())
    }

    pub fn associations(&self) -> impl Iterator<Item = (&ColumnDef, &Association<T>)> + '_ {
        self.schema
            .columns
            .iter()
            .zip(self.access.iter())
            .filter_map(|(column, access)| match access {
                ColumnAccess::ManyToMany(association) => Some((column, association)),
                ColumnAccess::Scalar { .. } => None,
            })
    }

    /// Synthesize and attach the join profile of a many-to-many column
    ///
    /// A column that is already wired keeps its first join profile.
    pub fn wire_association(&self, column: &ColumnDef, embedded: &TableSchema) -> Result<&JoinLink> {
        let Some(ColumnAccess::ManyToMany(association)) = self.access.get(column.index()) else {
            return Err(EntityError::NotAssociation {
                table: self.table_name().to_string(),
                field: column.field_name.clone(),
            }
            .into());
        };
        if let Some(link) = association.link.get() {
            return Ok(link);
        }
        let profile = synthesize_join(&self.schema, column, embedded)?;
        let link = JoinLink {
            target_table: embedded.table_name().to_string(),
            profile: Arc::new(profile),
        };
        Ok(association.link.get_or_init(move || link))
    }
}

impl<T: Default + 'static> Profile<T> {
    /// Blank instance rows are hydrated into
    pub fn new_instance(&self) -> T {
        T::default()
    }
}

impl<T> std::fmt::Debug for Profile<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("type_name", &self.type_name)
            .field("schema", &self.schema)
            .finish()
    }
}
