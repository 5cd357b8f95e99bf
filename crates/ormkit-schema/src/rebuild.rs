//! SQLite table rebuilds.
//!
//! SQLite cannot drop or redefine a column in place. The table is recreated
//! under a temporary name with the new column set, the rows are copied, the
//! old table is dropped and the new one takes its name.

use crate::describe::ColumnDescription;
use ormkit_core::{AttributeDef, Dialect, Error, Result, SchemaErrorKind, TableRef, Value};

/// The column level change that forces a rebuild.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnChange {
    Remove(String),
    /// Redefine the column named by the attribute's field
    Change(AttributeDef),
    Rename { from: String, to: String },
}

impl ColumnChange {
    fn column(&self) -> &str {
        match self {
            ColumnChange::Remove(name) => name,
            ColumnChange::Change(attribute) => attribute.field_name(),
            ColumnChange::Rename { from, .. } => from,
        }
    }
}

impl ColumnDescription {
    /// Description of the column an attribute would create on SQLite.
    pub fn from_attribute(attribute: &AttributeDef) -> Self {
        Self {
            name: attribute.field_name().to_string(),
            sql_type: attribute.data_type.sql_name(Dialect::Sqlite),
            allow_null: attribute.allow_null && !attribute.primary_key,
            default_value: attribute
                .default_value
                .as_ref()
                .filter(|v| !matches!(v, Value::Default))
                .map(|v| Dialect::Sqlite.escape(v)),
            primary_key: attribute.primary_key,
            references: attribute.references.clone(),
            on_delete: attribute.on_delete.map(|a| a.as_sql().to_string()),
            on_update: attribute.on_update.map(|a| a.as_sql().to_string()),
        }
    }
}

fn column_sql(column: &ColumnDescription) -> String {
    let dialect = Dialect::Sqlite;
    let mut sql = format!("{} {}", dialect.quote_identifier(&column.name), column.sql_type);
    if !column.allow_null {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default_value {
        sql.push_str(" DEFAULT ");
        sql.push_str(default);
    }
    if let Some(references) = &column.references {
        sql.push_str(&format!(
            " REFERENCES {} ({})",
            dialect.quote_identifier(&references.model),
            dialect.quote_identifier(&references.key)
        ));
        if let Some(action) = &column.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action);
        }
        if let Some(action) = &column.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action);
        }
    }
    sql
}

/// Statements that rebuild `table` with `change` applied.
///
/// `foreign_keys_enabled` wraps the rebuild in `PRAGMA foreign_keys` toggles
/// so dropping the old table does not cascade into referencing rows.
pub fn rebuild_table(
    table: &TableRef,
    columns: &[ColumnDescription],
    change: &ColumnChange,
    foreign_keys_enabled: bool,
) -> Result<Vec<String>> {
    let dialect = Dialect::Sqlite;
    if !columns.iter().any(|c| c.name == change.column()) {
        return Err(Error::schema(
            SchemaErrorKind::ColumnNotFound,
            format!("column \"{}\" not found on table \"{}\"", change.column(), table),
        ));
    }

    // (new column, expression selecting its data from the old table)
    let mut layout: Vec<(ColumnDescription, String)> = Vec::with_capacity(columns.len());
    for column in columns {
        let old = dialect.quote_identifier(&column.name);
        if column.name != change.column() {
            layout.push((column.clone(), old));
            continue;
        }
        match change {
            ColumnChange::Remove(_) => {}
            ColumnChange::Change(attribute) => {
                layout.push((ColumnDescription::from_attribute(attribute), old));
            }
            ColumnChange::Rename { to, .. } => {
                let mut renamed = column.clone();
                renamed.name.clone_from(to);
                layout.push((renamed, old));
            }
        }
    }

    if layout.is_empty() {
        return Err(Error::schema(
            SchemaErrorKind::Invalid,
            format!("cannot remove the last column of table \"{table}\""),
        ));
    }

    let tmp = TableRef {
        schema: table.schema.clone(),
        name: format!("{}_ormkit_rebuild", table.name),
    };
    let mut definitions: Vec<String> = layout.iter().map(|(c, _)| column_sql(c)).collect();
    let pk: Vec<String> = layout
        .iter()
        .filter(|(c, _)| c.primary_key)
        .map(|(c, _)| dialect.quote_identifier(&c.name))
        .collect();
    if !pk.is_empty() {
        definitions.push(format!("PRIMARY KEY ({})", pk.join(", ")));
    }
    let insert_cols: Vec<String> = layout
        .iter()
        .map(|(c, _)| dialect.quote_identifier(&c.name))
        .collect();
    let select_exprs: Vec<&str> = layout.iter().map(|(_, expr)| expr.as_str()).collect();

    tracing::debug!(
        table = %table,
        column = change.column(),
        "Rebuilding SQLite table"
    );

    let mut statements = Vec::new();
    if foreign_keys_enabled {
        statements.push("PRAGMA foreign_keys = OFF;".to_string());
    }
    statements.push(format!(
        "CREATE TABLE {} ({});",
        tmp.quoted(dialect),
        definitions.join(", ")
    ));
    statements.push(format!(
        "INSERT INTO {} ({}) SELECT {} FROM {};",
        tmp.quoted(dialect),
        insert_cols.join(", "),
        select_exprs.join(", "),
        table.quoted(dialect)
    ));
    statements.push(format!("DROP TABLE {};", table.quoted(dialect)));
    statements.push(format!(
        "ALTER TABLE {} RENAME TO {};",
        tmp.quoted(dialect),
        table.quoted(dialect)
    ));
    if foreign_keys_enabled {
        statements.push("PRAGMA foreign_keys = ON;".to_string());
    }
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormkit_core::DataType;

    fn users() -> Vec<ColumnDescription> {
        vec![
            ColumnDescription {
                name: "id".into(),
                sql_type: "INTEGER".into(),
                allow_null: false,
                default_value: None,
                primary_key: true,
                references: None,
                on_delete: None,
                on_update: None,
            },
            ColumnDescription {
                name: "name".into(),
                sql_type: "VARCHAR(255)".into(),
                allow_null: true,
                default_value: None,
                primary_key: false,
                references: None,
                on_delete: None,
                on_update: None,
            },
            ColumnDescription {
                name: "age".into(),
                sql_type: "INTEGER".into(),
                allow_null: true,
                default_value: Some("0".into()),
                primary_key: false,
                references: None,
                on_delete: None,
                on_update: None,
            },
        ]
    }

    #[test]
    fn remove_column_copies_remaining_columns() {
        let statements = rebuild_table(
            &TableRef::new("users"),
            &users(),
            &ColumnChange::Remove("age".into()),
            true,
        )
        .expect("rebuild");
        assert_eq!(
            statements,
            vec![
                "PRAGMA foreign_keys = OFF;",
                "CREATE TABLE \"users_ormkit_rebuild\" (\"id\" INTEGER NOT NULL, \"name\" VARCHAR(255), PRIMARY KEY (\"id\"));",
                "INSERT INTO \"users_ormkit_rebuild\" (\"id\", \"name\") SELECT \"id\", \"name\" FROM \"users\";",
                "DROP TABLE \"users\";",
                "ALTER TABLE \"users_ormkit_rebuild\" RENAME TO \"users\";",
                "PRAGMA foreign_keys = ON;",
            ]
        );
    }

    #[test]
    fn rename_selects_from_old_name() {
        let statements = rebuild_table(
            &TableRef::new("users"),
            &users(),
            &ColumnChange::Rename {
                from: "name".into(),
                to: "full_name".into(),
            },
            false,
        )
        .expect("rebuild");
        assert_eq!(
            statements[1],
            "INSERT INTO \"users_ormkit_rebuild\" (\"id\", \"full_name\", \"age\") SELECT \"id\", \"name\", \"age\" FROM \"users\";"
        );
    }

    #[test]
    fn change_uses_the_new_definition() {
        let attribute = AttributeDef::new("age", DataType::BigInt).not_null();
        let statements = rebuild_table(
            &TableRef::new("users"),
            &users(),
            &ColumnChange::Change(attribute),
            false,
        )
        .expect("rebuild");
        assert!(statements[0].contains("\"age\" BIGINT NOT NULL"));
    }

    #[test]
    fn unknown_column_is_a_schema_error() {
        let err = rebuild_table(
            &TableRef::new("users"),
            &users(),
            &ColumnChange::Remove("missing".into()),
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(ref e) if e.kind == SchemaErrorKind::ColumnNotFound
        ));
    }
}
