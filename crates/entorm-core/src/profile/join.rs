//! Join-table synthesis for many-to-many columns

#![allow(clippy::result_large_err)]

use super::{derive_profile, ColumnDef, ForeignKey, Profile, TableSchema, UniqueConstraint};
use crate::errors::{EntityError, Result};
use crate::mapping::{Entity, Field, Mapping};
use crate::statement::Statements;

/// One (owner, embedded) link row
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JoinRow {
    pub id: Option<i64>,
    pub owner_id: Option<i64>,
    pub embedded_id: Option<i64>,
}

impl JoinRow {
    pub fn new(owner_id: i64, embedded_id: i64) -> Self {
        Self {
            id: None,
            owner_id: Some(owner_id),
            embedded_id: Some(embedded_id),
        }
    }

    /// Owner-side reference column of a join schema
    pub fn owner_column(schema: &TableSchema) -> Result<&ColumnDef> {
        Self::reference_column(schema, "owner_id")
    }

    /// Embedded-side reference column of a join schema
    pub fn embedded_column(schema: &TableSchema) -> Result<&ColumnDef> {
        Self::reference_column(schema, "embedded_id")
    }

    fn reference_column<'a>(schema: &'a TableSchema, field: &str) -> Result<&'a ColumnDef> {
        schema.column_by_field(field).ok_or_else(|| {
            EntityError::UnknownField {
                table: schema.table_name().to_string(),
                field: field.to_string(),
            }
            .into()
        })
    }
}

impl Entity for JoinRow {
    fn mapping() -> Mapping<Self> {
        Mapping::<Self>::entity()
            .field(Field::id("id", |r| &r.id, |r| &mut r.id))
            .field(Field::new("owner_id", |r| &r.owner_id, |r| &mut r.owner_id))
            .field(Field::new(
                "embedded_id",
                |r| &r.embedded_id,
                |r| &mut r.embedded_id,
            ))
    }
}

/// Build the join profile behind `column` of `owner`
///
/// Table name is the explicit join table name or `{owner}_{embedded}`; each
/// reference column is the explicit join column name or `{table}_Id`. Both
/// references cascade on delete and the pair is unique.
pub fn synthesize_join(
    owner: &TableSchema,
    column: &ColumnDef,
    embedded: &TableSchema,
) -> Result<Profile<JoinRow>> {
    let Some(info) = column.association() else {
        return Err(EntityError::NotAssociation {
            table: owner.table_name().to_string(),
            field: column.field_name.clone(),
        }
        .into());
    };
    let explicit = info.join_table.clone().unwrap_or_default();

    let table_name = explicit
        .name
        .unwrap_or_else(|| format!("{}_{}", owner.table_name(), embedded.table_name()));
    let owner_column = explicit
        .join_column
        .name
        .unwrap_or_else(|| format!("{}_Id", owner.table_name()));
    let owner_reference = explicit
        .join_column
        .referenced_column
        .unwrap_or_else(|| owner.id_column().column_name.clone());
    let embedded_column = explicit
        .inverse_join_column
        .name
        .unwrap_or_else(|| format!("{}_Id", embedded.table_name()));
    let embedded_reference = explicit
        .inverse_join_column
        .referenced_column
        .unwrap_or_else(|| embedded.id_column().column_name.clone());

    if owner_column.eq_ignore_ascii_case(&embedded_column) {
        return Err(EntityError::DuplicateColumn {
            type_name: table_name,
            column: owner_column,
        }
        .into());
    }

    let mut profile = derive_profile::<JoinRow>()?;
    let schema = &mut profile.schema;
    schema.table_name = table_name;
    for column in schema.columns.iter_mut() {
        match column.field_name.as_str() {
            "owner_id" => column.column_name = owner_column.clone(),
            "embedded_id" => column.column_name = embedded_column.clone(),
            _ => {}
        }
    }
    schema.unique_constraints.push(UniqueConstraint {
        columns: vec![owner_column.clone(), embedded_column.clone()],
    });
    schema.foreign_keys.push(ForeignKey {
        columns: vec![owner_column],
        reference_table: owner.table_name().to_string(),
        reference_columns: vec![owner_reference],
    });
    schema.foreign_keys.push(ForeignKey {
        columns: vec![embedded_column],
        reference_table: embedded.table_name().to_string(),
        reference_columns: vec![embedded_reference],
    });
    profile.statements = Statements::build(&profile.schema);

    tracing::debug!(
        table = profile.table_name(),
        owner = owner.table_name(),
        embedded = embedded.table_name(),
        "join profile synthesized"
    );

    Ok(profile)
}
