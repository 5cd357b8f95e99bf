//! Normalized table descriptions.
//!
//! Each dialect answers "describe this table" with its own row shape:
//! SQLite's `PRAGMA TABLE_INFO` (`name`, `type`, `notnull`, `dflt_value`,
//! `pk`) or the `Field`/`Type`/`Null`/`Default`/`Key` shape used by the
//! MySQL and PostgreSQL queries. Both become [`ColumnDescription`]s.

use ormkit_core::{References, Row, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    /// Column type as the database spells it
    pub sql_type: String,
    pub allow_null: bool,
    /// Default as raw SQL text
    pub default_value: Option<String>,
    pub primary_key: bool,
    pub references: Option<References>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

pub type TableDescription = Vec<ColumnDescription>;

fn text(row: &Row, name: &str) -> Option<String> {
    match row.get_by_name(name)? {
        Value::Null => None,
        value => value
            .as_str()
            .map(str::to_string)
            .or_else(|| value.as_i64().map(|n| n.to_string())),
    }
}

impl ColumnDescription {
    /// Parse one describe row; `None` when the row has neither shape.
    pub fn from_row(row: &Row) -> Option<Self> {
        if let Some(name) = text(row, "name").filter(|_| row.contains_column("notnull")) {
            // PRAGMA TABLE_INFO
            let not_null = row
                .get_by_name("notnull")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            let pk = row.get_by_name("pk").and_then(Value::as_i64).unwrap_or(0);
            return Some(Self {
                name,
                sql_type: text(row, "type").unwrap_or_default(),
                allow_null: not_null == 0 && pk == 0,
                default_value: text(row, "dflt_value"),
                primary_key: pk > 0,
                references: None,
                on_delete: None,
                on_update: None,
            });
        }

        let name = text(row, "Field")?;
        Some(Self {
            name,
            sql_type: text(row, "Type").unwrap_or_default().to_uppercase(),
            allow_null: text(row, "Null").is_some_and(|n| n.eq_ignore_ascii_case("YES")),
            default_value: text(row, "Default"),
            primary_key: text(row, "Key").is_some_and(|k| k == "PRI"),
            references: None,
            on_delete: None,
            on_update: None,
        })
    }
}

/// Parse a full describe result, skipping unrecognized rows.
pub fn describe_rows(rows: &[Row]) -> TableDescription {
    rows.iter().filter_map(ColumnDescription::from_row).collect()
}

/// Attach SQLite `PRAGMA foreign_key_list` rows to their columns.
pub fn apply_foreign_keys(columns: &mut [ColumnDescription], rows: &[Row]) {
    for row in rows {
        let (Some(from), Some(table)) = (text(row, "from"), text(row, "table")) else {
            continue;
        };
        if let Some(column) = columns.iter_mut().find(|c| c.name == from) {
            column.references = Some(References {
                model: table,
                key: text(row, "to").unwrap_or_else(|| "id".to_string()),
            });
            column.on_delete = text(row, "on_delete").filter(|a| a != "NO ACTION");
            column.on_update = text(row, "on_update").filter(|a| a != "NO ACTION");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_pragma_rows() {
        let rows = vec![
            Row::from_pairs([
                ("cid", Value::BigInt(0)),
                ("name", Value::Text("id".into())),
                ("type", Value::Text("INTEGER".into())),
                ("notnull", Value::BigInt(1)),
                ("dflt_value", Value::Null),
                ("pk", Value::BigInt(1)),
            ]),
            Row::from_pairs([
                ("cid", Value::BigInt(1)),
                ("name", Value::Text("title".into())),
                ("type", Value::Text("VARCHAR(255)".into())),
                ("notnull", Value::BigInt(0)),
                ("dflt_value", Value::Text("'untitled'".into())),
                ("pk", Value::BigInt(0)),
            ]),
        ];
        let columns = describe_rows(&rows);
        assert_eq!(columns.len(), 2);
        assert!(columns[0].primary_key);
        assert!(!columns[0].allow_null);
        assert!(columns[1].allow_null);
        assert_eq!(columns[1].default_value.as_deref(), Some("'untitled'"));
    }

    #[test]
    fn parses_field_shaped_rows() {
        let row = Row::from_pairs([
            ("Field", Value::Text("email".into())),
            ("Type", Value::Text("character varying".into())),
            ("Null", Value::Text("NO".into())),
            ("Default", Value::Null),
            ("Key", Value::Text(String::new())),
        ]);
        let column = ColumnDescription::from_row(&row).expect("field row");
        assert_eq!(column.sql_type, "CHARACTER VARYING");
        assert!(!column.allow_null);
        assert!(!column.primary_key);
    }

    #[test]
    fn foreign_keys_attach_to_columns() {
        let mut columns = vec![ColumnDescription {
            name: "PostId".into(),
            sql_type: "INTEGER".into(),
            allow_null: false,
            default_value: None,
            primary_key: true,
            references: None,
            on_delete: None,
            on_update: None,
        }];
        let fk = Row::from_pairs([
            ("table", Value::Text("Posts".into())),
            ("from", Value::Text("PostId".into())),
            ("to", Value::Text("id".into())),
            ("on_update", Value::Text("CASCADE".into())),
            ("on_delete", Value::Text("NO ACTION".into())),
        ]);
        apply_foreign_keys(&mut columns, &[fk]);
        assert_eq!(
            columns[0].references,
            Some(References {
                model: "Posts".into(),
                key: "id".into()
            })
        );
        assert_eq!(columns[0].on_update.as_deref(), Some("CASCADE"));
        assert_eq!(columns[0].on_delete, None);
    }
}
