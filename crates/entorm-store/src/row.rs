//! Positional binding and row hydration

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use entorm_core::errors::ConversionError;
use entorm_core::{EntityError, Entity, Profile, Value, ValueType};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Row, Statement, ToSql};

/// Binds a [`Value`] as a statement parameter; booleans become 0/1
pub(crate) struct Bind<'a>(pub(crate) &'a Value);

impl ToSql for Bind<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Owned(SqlValue::Real(*r)),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
        })
    }
}

pub(crate) fn binds(values: &[Value]) -> impl Iterator<Item = Bind<'_>> {
    values.iter().map(Bind)
}

/// Placeholder count must equal the argument count
pub(crate) fn check_parameter_count(stmt: &Statement<'_>, supplied: usize) -> Result<()> {
    let expected = stmt.parameter_count();
    if expected != supplied {
        return Err(EntityError::ParameterCount {
            expected,
            actual: supplied,
        }
        .into());
    }
    Ok(())
}

/// A query must project at least every column of the entity
pub(crate) fn check_projection<T>(stmt: &Statement<'_>, profile: &Profile<T>) -> Result<()>
where
    T: 'static,
{
    let expected = profile.schema().scalar_columns().count();
    let actual = stmt.column_count();
    if actual < expected {
        return Err(EntityError::ProjectionTooNarrow {
            table: profile.table_name().to_string(),
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

fn read_value(row: &Row<'_>, index: usize, value_type: ValueType) -> Result<Value> {
    let raw = row.get_ref(index).map_err(from_rusqlite)?;
    let value = match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => match value_type {
            ValueType::Boolean => Value::Boolean(i != 0),
            ValueType::Real => Value::Real(i as f64),
            ValueType::Text | ValueType::Integer => Value::Integer(i),
        },
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Value::Text(text.to_string()),
            Err(_) => {
                return Err(ConversionError {
                    expected: value_type.name(),
                    found: "invalid UTF-8 text".to_string(),
                }
                .into())
            }
        },
        ValueRef::Blob(_) => {
            return Err(ConversionError {
                expected: value_type.name(),
                found: "blob".to_string(),
            }
            .into())
        }
    };
    Ok(value)
}

/// Blank instance, then every scalar column assigned by position
pub(crate) fn hydrate<T: Entity>(profile: &Profile<T>, row: &Row<'_>) -> Result<T> {
    let mut value = profile.new_instance();
    for (index, column) in profile.schema().scalar_columns().enumerate() {
        let Some(value_type) = column.value_type() else {
            continue;
        };
        let stored = read_value(row, index, value_type)?;
        profile
            .set(column, &mut value, stored)
            .map_err(|e| e.with_table(profile.table_name()))?;
    }
    Ok(value)
}
