//! Entity mapping
//!
//! A type describes its table once, through a [`Mapping`] built from typed
//! field accessors. The profile factory reads this description; nothing is
//! discovered at runtime.
//!
//! ```
//! use entorm_core::mapping::{ColumnOptions, Entity, Field, Mapping};
//!
//! #[derive(Debug, Clone, Default)]
//! struct Author {
//!     id: Option<i64>,
//!     name: String,
//! }
//!
//! impl Entity for Author {
//!     fn mapping() -> Mapping<Self> {
//!         Mapping::<Self>::entity()
//!             .table("authors")
//!             .field(Field::id("id", |a| &a.id, |a| &mut a.id))
//!             .field_with(Field::new("name", |a| &a.name, |a| &mut a.name), |f| {
//!                 f.column(ColumnOptions::default().unique(true))
//!             })
//!     }
//! }
//! ```

pub mod collection;
pub mod field;

pub use collection::{ContainerKind, EntityCollection};
pub use field::{ColumnOptions, Elements, Field, FieldValue, GenerationType, JoinColumn, JoinTable};

use std::fmt;

/// A type that maps onto a table
///
/// `Default` supplies the blank instance rows are hydrated into.
pub trait Entity: Default + Clone + fmt::Debug + Send + Sync + 'static {
    fn mapping() -> Mapping<Self>;
}

/// Whether a mapping describes a table or only shared base fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    Entity,
    MappedSuperclass,
}

/// Declared table shape of `T`
pub struct Mapping<T> {
    kind: MappingKind,
    table: Option<String>,
    unique_constraints: Vec<Vec<String>>,
    inherited: Vec<Field<T>>,
    fields: Vec<Field<T>>,
}

impl<T: 'static> Mapping<T> {
    /// A persistable entity
    pub fn entity() -> Self {
        Self::with_kind(MappingKind::Entity)
    }

    /// A base whose fields are inherited by entities embedding it
    pub fn mapped_superclass() -> Self {
        Self::with_kind(MappingKind::MappedSuperclass)
    }

    fn with_kind(kind: MappingKind) -> Self {
        Self {
            kind,
            table: None,
            unique_constraints: Vec::new(),
            inherited: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Table name; defaults to the type name
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table = Some(name.into());
        self
    }

    /// Composite unique constraint over column names
    pub fn unique_constraint<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_constraints
            .push(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Inherit every field of the embedded base `B`, ahead of own fields
    pub fn extends<B: Entity>(mut self, base: fn(&T) -> &B, base_mut: fn(&mut T) -> &mut B) -> Self {
        let base_mapping = B::mapping();
        self.inherited.extend(
            base_mapping
                .into_fields()
                .map(|field| field.lift(base, base_mut)),
        );
        self
    }

    pub fn field(mut self, field: Field<T>) -> Self {
        self.fields.push(field);
        self
    }

    /// Add `field` after applying `configure` to it
    ///
    /// The accessor closures of `field` are typed against `T` here, so
    /// column options and flags go through `configure` rather than being
    /// chained onto the constructor.
    pub fn field_with(self, field: Field<T>, configure: impl FnOnce(Field<T>) -> Field<T>) -> Self {
        self.field(configure(field))
    }

    pub fn kind(&self) -> MappingKind {
        self.kind
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn unique_constraints(&self) -> &[Vec<String>] {
        &self.unique_constraints
    }

    /// Inherited fields first, then own fields, in declaration order
    pub(crate) fn into_fields(self) -> impl Iterator<Item = Field<T>> {
        self.inherited.into_iter().chain(self.fields)
    }
}
