//! Statement builder
//!
//! Pure functions from a [`TableSchema`] to SQL text. Every statement lists
//! columns in schema order, which is the order values are bound in.

use crate::dialect::{Dialect, SqliteDialect};
use crate::profile::{ColumnDef, TableSchema};

/// Statement text cached on each profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statements {
    pub insert: String,
    /// `None` when no column is updatable
    pub update_by_id: Option<String>,
    pub read_by_natural_key: String,
    pub read_by_id: String,
    pub read_all: String,
    pub delete_by_id: String,
}

impl Statements {
    pub fn build(schema: &TableSchema) -> Self {
        Self {
            insert: build_insert(schema),
            update_by_id: build_update_by_id(schema),
            read_by_natural_key: build_read_by_natural_key(schema),
            read_by_id: build_read_by_id(schema),
            read_all: build_read_all(schema),
            delete_by_id: build_delete_by_id(schema),
        }
    }
}

/// CREATE TABLE text in the SQLite dialect
pub fn build_create(schema: &TableSchema, if_not_exists: bool) -> String {
    build_create_with(&SqliteDialect, schema, if_not_exists)
}

pub fn build_create_with(dialect: &dyn Dialect, schema: &TableSchema, if_not_exists: bool) -> String {
    let mut lines: Vec<String> = schema
        .scalar_columns()
        .map(|c| field_line(dialect, c))
        .collect();
    lines.extend(
        schema
            .unique_constraints()
            .iter()
            .map(|u| format!("UNIQUE({})", quoted(&u.columns))),
    );
    lines.extend(schema.foreign_keys().iter().map(|fk| {
        format!(
            "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
            quoted(&fk.columns),
            quote_identifier(&fk.reference_table),
            quoted(&fk.reference_columns)
        )
    }));
    format!(
        "CREATE TABLE {}{}(\n{}\n)",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        table(schema),
        lines.join(",\n")
    )
}

fn field_line(dialect: &dyn Dialect, column: &ColumnDef) -> String {
    let mut line = format!("{}\t", quote_identifier(&column.column_name));
    match (&column.definition, column.value_type()) {
        (Some(definition), _) => line.push_str(definition),
        (None, Some(value_type)) => line.push_str(dialect.storage_type(value_type)),
        (None, None) => {}
    }
    if column.id {
        line.push_str(" PRIMARY KEY");
    }
    if column.generation.is_some() {
        line.push(' ');
        line.push_str(dialect.auto_increment());
    }
    if !column.nullable {
        line.push_str(" NOT NULL");
    }
    if column.unique {
        line.push_str(" UNIQUE");
    }
    line
}

/// Double-quoted SQL identifier; embedded quotes are doubled
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn table(schema: &TableSchema) -> String {
    quote_identifier(schema.table_name())
}

fn column(column: &ColumnDef) -> String {
    quote_identifier(&column.column_name)
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_identifier(n))
        .collect::<Vec<_>>()
        .join(",")
}

fn column_list<'a>(columns: impl Iterator<Item = &'a ColumnDef>) -> Vec<String> {
    columns.map(column).collect()
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

pub fn build_drop(schema: &TableSchema, if_exists: bool) -> String {
    format!(
        "DROP TABLE {}{}",
        if if_exists { "IF EXISTS " } else { "" },
        table(schema)
    )
}

pub fn build_insert(schema: &TableSchema) -> String {
    let columns = column_list(schema.insertable_columns());
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table(schema),
        columns.join(","),
        placeholders(columns.len())
    )
}

pub fn build_update_by_id(schema: &TableSchema) -> Option<String> {
    let columns = column_list(schema.updatable_columns());
    if columns.is_empty() {
        return None;
    }
    Some(format!(
        "UPDATE {} SET ({})=({})\nWHERE {}=?",
        table(schema),
        columns.join(","),
        placeholders(columns.len()),
        column(schema.id_column())
    ))
}

pub fn build_read_by_natural_key(schema: &TableSchema) -> String {
    let nulls = vec![false; schema.natural_key_columns().count()];
    build_read_by_natural_key_with_nulls(schema, &nulls)
}

/// Natural-key lookup where `nulls[i]` turns the i-th predicate into `IS NULL`
pub fn build_read_by_natural_key_with_nulls(schema: &TableSchema, nulls: &[bool]) -> String {
    let predicate = schema
        .natural_key_columns()
        .enumerate()
        .map(|(i, c)| {
            if nulls.get(i).copied().unwrap_or(false) {
                format!("{} IS NULL", column(c))
            } else {
                format!("{}=?", column(c))
            }
        })
        .collect::<Vec<_>>()
        .join(" AND ");
    if predicate.is_empty() {
        return build_read_all(schema);
    }
    build_find_all(schema, &predicate)
}

pub fn build_read_by_id(schema: &TableSchema) -> String {
    build_find_all(schema, &format!("{}=?", column(schema.id_column())))
}

pub fn build_read_all(schema: &TableSchema) -> String {
    format!("SELECT * FROM {}", table(schema))
}

/// Lookup with `col=?` per column, joined by AND
pub fn build_find_by_columns(schema: &TableSchema, columns: &[&ColumnDef]) -> String {
    let predicate = columns
        .iter()
        .map(|c| format!("{}=?", column(c)))
        .collect::<Vec<_>>()
        .join(" AND ");
    build_find_all(schema, &predicate)
}

/// `where_fragment` is caller SQL and is not rewritten
pub fn build_find_all(schema: &TableSchema, where_fragment: &str) -> String {
    format!("{}\nWHERE {}", build_read_all(schema), where_fragment)
}

pub fn build_delete_by_id(schema: &TableSchema) -> String {
    build_delete_all(schema, &format!("{} = ?", column(schema.id_column())))
}

pub fn build_delete_all(schema: &TableSchema, where_fragment: &str) -> String {
    format!("DELETE FROM {} WHERE {}", table(schema), where_fragment)
}

pub fn build_update_field(schema: &TableSchema, target: &ColumnDef) -> String {
    format!(
        "UPDATE {} SET {} = ? WHERE {} = ?",
        table(schema),
        column(target),
        column(schema.id_column())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{ColumnOptions, Entity, Field, Mapping};
    use crate::profile::derive_profile;

    #[derive(Debug, Clone, Default)]
    struct Note {
        id: Option<i64>,
        title: Option<String>,
        body: String,
        pinned: bool,
    }

    impl Entity for Note {
        fn mapping() -> Mapping<Self> {
            Mapping::<Self>::entity()
                .table("notes")
                .unique_constraint(["title", "body"])
                .field_with(Field::id("id", |n| &n.id, |n| &mut n.id), |f| {
                    f.column(ColumnOptions::default().updatable(false))
                })
                .field_with(Field::new("title", |n| &n.title, |n| &mut n.title), |f| {
                    f.column(ColumnOptions::default().unique(true).nullable(false))
                })
                .field(Field::new("body", |n| &n.body, |n| &mut n.body))
                .field_with(Field::new("pinned", |n| &n.pinned, |n| &mut n.pinned), |f| {
                    f.column(
                        ColumnOptions::default()
                            .insertable(false)
                            .definition("INTEGER DEFAULT 0"),
                    )
                })
        }
    }

    fn schema() -> TableSchema {
        derive_profile::<Note>().unwrap().schema().clone()
    }

    #[test]
    fn test_create_statement_layout() {
        assert_eq!(
            build_create(&schema(), true),
            "CREATE TABLE IF NOT EXISTS \"notes\"(\n\
             \"id\"\tINTEGER PRIMARY KEY AUTOINCREMENT,\n\
             \"title\"\tTEXT NOT NULL UNIQUE,\n\
             \"body\"\tTEXT,\n\
             \"pinned\"\tINTEGER DEFAULT 0,\n\
             UNIQUE(\"title\",\"body\")\n\
             )"
        );
    }

    #[test]
    fn test_insert_skips_non_insertable() {
        assert_eq!(
            build_insert(&schema()),
            r#"INSERT INTO "notes" ("id","title","body") VALUES (?,?,?)"#
        );
    }

    #[test]
    fn test_update_excludes_id() {
        assert_eq!(
            build_update_by_id(&schema()).unwrap(),
            "UPDATE \"notes\" SET (\"title\",\"body\",\"pinned\")=(?,?,?)\nWHERE \"id\"=?"
        );
    }

    #[test]
    fn test_natural_key_nulls_use_is_null() {
        let schema = schema();
        assert_eq!(
            build_read_by_natural_key(&schema),
            "SELECT * FROM \"notes\"\nWHERE \"title\"=? AND \"body\"=? AND \"pinned\"=?"
        );
        assert_eq!(
            build_read_by_natural_key_with_nulls(&schema, &[true, false, false]),
            "SELECT * FROM \"notes\"\nWHERE \"title\" IS NULL AND \"body\"=? AND \"pinned\"=?"
        );
    }

    #[test]
    fn test_drop_and_field_update() {
        let schema = schema();
        assert_eq!(build_drop(&schema, true), r#"DROP TABLE IF EXISTS "notes""#);
        assert_eq!(build_drop(&schema, false), r#"DROP TABLE "notes""#);
        let body = schema.column_by_field("body").unwrap();
        assert_eq!(
            build_update_field(&schema, body),
            r#"UPDATE "notes" SET "body" = ? WHERE "id" = ?"#
        );
        assert_eq!(build_delete_by_id(&schema), r#"DELETE FROM "notes" WHERE "id" = ?"#);
    }

    #[test]
    fn test_identifiers_are_quoted() {
        assert_eq!(quote_identifier("order"), "\"order\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
