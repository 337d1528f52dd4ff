//! Profile derivation from an entity's mapping

#![allow(clippy::result_large_err)]

use super::{
    AssociationInfo, Association, ColumnAccess, ColumnDef, ColumnKind, Profile, TableSchema,
    UniqueConstraint,
};
use crate::errors::{EntityError, Result};
use crate::mapping::field::FieldKind;
use crate::mapping::{Entity, MappingKind};
use entorm_core_types::ValueType;
use std::sync::OnceLock;

/// Derive the profile of `T`
///
/// Fails with a configuration error when the mapping is not an entity,
/// declares no persistable field, declares zero or several ids, has a
/// read-only field that is not transient, maps the same field or column
/// twice, or names an unknown column in a unique constraint.
pub fn derive_profile<T: Entity>() -> Result<Profile<T>> {
    let type_name = short_type_name::<T>();
    let mapping = T::mapping();

    if mapping.kind() != MappingKind::Entity {
        return Err(EntityError::NotAnEntity {
            type_name: type_name.to_string(),
        }
        .into());
    }

    let table_name = mapping.table_name().unwrap_or(type_name).to_string();
    let declared_constraints = mapping.unique_constraints().to_vec();

    let mut columns: Vec<ColumnDef> = Vec::new();
    let mut access: Vec<ColumnAccess<T>> = Vec::new();

    for field in mapping.into_fields() {
        if field.transient {
            continue;
        }
        if columns.iter().any(|c| c.field_name == field.name) {
            return Err(EntityError::DuplicateField {
                type_name: type_name.to_string(),
                field: field.name,
            }
            .into());
        }
        let column_name = field.options.name.clone().unwrap_or_else(|| field.name.clone());
        if columns
            .iter()
            .any(|c| c.column_name.eq_ignore_ascii_case(&column_name))
        {
            return Err(EntityError::DuplicateColumn {
                type_name: type_name.to_string(),
                column: column_name,
            }
            .into());
        }

        let kind = match field.kind {
            FieldKind::Scalar {
                value_type,
                get,
                set,
            } => {
                let Some(set) = set else {
                    return Err(EntityError::ImmutableField {
                        type_name: type_name.to_string(),
                        field: field.name,
                    }
                    .into());
                };
                if field.id && value_type != ValueType::Integer {
                    return Err(EntityError::IdNotInteger {
                        type_name: type_name.to_string(),
                        field: field.name,
                        found: value_type,
                    }
                    .into());
                }
                access.push(ColumnAccess::Scalar { get, set });
                ColumnKind::Scalar(value_type)
            }
            FieldKind::ManyToMany(def) => {
                let info = AssociationInfo {
                    target: def.target_name,
                    container: def.container,
                    fetch_eager: def.fetch_eager,
                    join_table: def.join_table.clone(),
                };
                access.push(ColumnAccess::ManyToMany(Association {
                    def,
                    link: OnceLock::new(),
                }));
                ColumnKind::ManyToMany(info)
            }
        };

        columns.push(ColumnDef {
            order: columns.len() + 1,
            field_name: field.name,
            column_name,
            kind,
            id: field.id,
            generation: if field.id { field.generation } else { None },
            insertable: field.options.insertable,
            updatable: field.options.updatable,
            nullable: field.options.nullable,
            unique: field.options.unique,
            length: field.options.length,
            definition: field.options.definition,
        });
    }

    if columns.is_empty() {
        return Err(EntityError::NoPersistentFields {
            type_name: type_name.to_string(),
        }
        .into());
    }

    let ids: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.id)
        .map(|(i, _)| i)
        .collect();
    let id_index = match ids.as_slice() {
        [single] => *single,
        [] => {
            return Err(EntityError::MissingId {
                type_name: type_name.to_string(),
            }
            .into())
        }
        _ => {
            return Err(EntityError::MultipleIds {
                type_name: type_name.to_string(),
                columns: ids.iter().map(|&i| columns[i].column_name.clone()).collect(),
            }
            .into())
        }
    };

    let mut schema = TableSchema {
        table_name,
        columns,
        id_index,
        unique_constraints: Vec::new(),
        foreign_keys: Vec::new(),
    };

    for declared in declared_constraints {
        let mut resolved = Vec::with_capacity(declared.len());
        for name in declared {
            match schema.column_by_name(&name).filter(|c| c.is_scalar()) {
                Some(column) => resolved.push(column.column_name.clone()),
                None => {
                    return Err(EntityError::UnknownConstraintColumn {
                        type_name: type_name.to_string(),
                        column: name,
                    }
                    .into())
                }
            }
        }
        schema
            .unique_constraints
            .push(UniqueConstraint { columns: resolved });
    }

    tracing::debug!(
        table = schema.table_name(),
        columns = schema.columns().len(),
        "profile derived"
    );

    Ok(Profile::assemble(type_name, schema, access))
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
