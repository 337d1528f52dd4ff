#![allow(dead_code)]

use entorm_core::mapping::{ColumnOptions, Entity, Field, JoinColumn, JoinTable, Mapping};
use std::collections::BTreeSet;

/// Shared identity base; not a table of its own
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identified {
    pub id: Option<i64>,
}

impl Entity for Identified {
    fn mapping() -> Mapping<Self> {
        Mapping::<Self>::mapped_superclass().field(Field::id("id", |i| &i.id, |i| &mut i.id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Embedded {
    pub base: Identified,
    pub first_field: Option<String>,
}

impl Embedded {
    pub fn named(first_field: &str) -> Self {
        Self {
            base: Identified::default(),
            first_field: Some(first_field.to_string()),
        }
    }
}

impl Entity for Embedded {
    fn mapping() -> Mapping<Self> {
        Mapping::<Self>::entity()
            .table("EmbeddedTable")
            .extends(|e| &e.base, |e| &mut e.base)
            .field(Field::new("firstField", |e| &e.first_field, |e| &mut e.first_field))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Main {
    pub id: Option<i64>,
    pub string_field: Option<String>,
    pub string_default_field: Option<String>,
    pub string_unique_field: Option<String>,
    pub double_field: Option<f64>,
    pub float_field: f32,
    pub boolean_field: bool,
    pub un_annotated_field: Option<String>,
    pub embedded_list: Option<Vec<Embedded>>,
    pub embedded_list_default: Option<BTreeSet<Embedded>>,
}

impl Default for Main {
    fn default() -> Self {
        Self {
            id: None,
            string_field: None,
            string_default_field: Some("default".to_string()),
            string_unique_field: None,
            double_field: None,
            float_field: 0.0,
            boolean_field: false,
            un_annotated_field: None,
            embedded_list: None,
            embedded_list_default: None,
        }
    }
}

impl Entity for Main {
    fn mapping() -> Mapping<Self> {
        Mapping::<Self>::entity()
            .table("MainTable")
            .unique_constraint(["stringField", "stringDefaultColumn"])
            .field_with(Field::id("id", |m| &m.id, |m| &mut m.id), |f| {
                f.column(ColumnOptions::default().unique(true).updatable(false))
            })
            .field(Field::new("stringField", |m| &m.string_field, |m| &mut m.string_field))
            .field_with(
                Field::new(
                    "stringDefaultField",
                    |m| &m.string_default_field,
                    |m| &mut m.string_default_field,
                ),
                |f| f.column(ColumnOptions::named("stringDefaultColumn")),
            )
            .field_with(
                Field::new(
                    "stringUniqueField",
                    |m| &m.string_unique_field,
                    |m| &mut m.string_unique_field,
                ),
                |f| f.column(ColumnOptions::named("UniqueField").unique(true)),
            )
            .field(Field::new("doubleField", |m| &m.double_field, |m| &mut m.double_field))
            .field(Field::new("floatField", |m| &m.float_field, |m| &mut m.float_field))
            .field_with(
                Field::new("booleanField", |m| &m.boolean_field, |m| &mut m.boolean_field),
                |f| f.column(ColumnOptions::default().definition("INTEGER DEFAULT 0")),
            )
            .field(Field::new(
                "unAnnotatedField",
                |m| &m.un_annotated_field,
                |m| &mut m.un_annotated_field,
            ))
            .field_with(
                Field::many_to_many::<Embedded, _>("embeddedList", |m| &mut m.embedded_list),
                |f| {
                    f.fetch_eager().join_table(
                        JoinTable::named("join_MainTable_with_EmbeddedTable")
                            .join_column(JoinColumn::named("OWNER_ID").references("id"))
                            .inverse_join_column(JoinColumn::named("EMBEDDED_ID").references("id")),
                    )
                },
            )
            .field_with(
                Field::many_to_many::<Embedded, _>("embeddedListDefault", |m| {
                    &mut m.embedded_list_default
                }),
                Field::fetch_eager,
            )
    }
}

/// Entity with no id column
#[derive(Debug, Clone, Default)]
pub struct Keyless {
    pub name: String,
}

impl Entity for Keyless {
    fn mapping() -> Mapping<Self> {
        Mapping::<Self>::entity().field(Field::new("name", |k| &k.name, |k| &mut k.name))
    }
}

/// Entity whose every field is transient
#[derive(Debug, Clone, Default)]
pub struct AllTransient {
    pub id: Option<i64>,
}

impl Entity for AllTransient {
    fn mapping() -> Mapping<Self> {
        Mapping::<Self>::entity().field_with(Field::id("id", |a| &a.id, |a| &mut a.id), Field::transient)
    }
}

/// Unique constraint naming a column that does not exist
#[derive(Debug, Clone, Default)]
pub struct BadConstraint {
    pub id: Option<i64>,
    pub name: String,
}

impl Entity for BadConstraint {
    fn mapping() -> Mapping<Self> {
        Mapping::<Self>::entity()
            .unique_constraint(["name", "missing"])
            .field(Field::id("id", |b| &b.id, |b| &mut b.id))
            .field(Field::new("name", |b| &b.name, |b| &mut b.name))
    }
}
