//! SQL dialect selection, quoting and literal escaping.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SQL dialect for generating dialect-specific SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    #[default]
    Postgres,
    /// SQLite dialect (uses ?1, ?2 placeholders)
    Sqlite,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
}

impl Dialect {
    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
        }
    }

    /// Whether the dialect has named schemas distinct from databases.
    pub const fn supports_schemas(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Whether `INSERT ... RETURNING` is available.
    pub const fn supports_returning(self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::Sqlite)
    }

    /// Quote an identifier for this dialect.
    ///
    /// Embedded quote characters are doubled.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                let escaped = name.replace('"', "\"\"");
                format!("\"{}\"", escaped)
            }
            Dialect::Mysql => {
                let escaped = name.replace('`', "``");
                format!("`{}`", escaped)
            }
        }
    }

    /// Split a dotted identifier and quote each part.
    pub fn quote_identifiers(self, dotted: &str) -> String {
        dotted
            .split('.')
            .map(|part| self.quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Quote a possibly schema-qualified table name.
    ///
    /// SQLite has no schemas; the qualified name becomes a single
    /// identifier joined with a dot.
    pub fn quote_table(self, schema: Option<&str>, table: &str) -> String {
        match (self, schema) {
            (_, None) => self.quote_identifier(table),
            (Dialect::Sqlite, Some(schema)) => {
                self.quote_identifier(&format!("{}.{}", schema, table))
            }
            (_, Some(schema)) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(table)
            ),
        }
    }

    /// Render a value as an inline SQL literal.
    pub fn escape(self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Default => "DEFAULT".to_string(),
            Value::Bool(b) => match self {
                Dialect::Postgres => if *b { "true" } else { "false" }.to_string(),
                Dialect::Sqlite | Dialect::Mysql => if *b { "1" } else { "0" }.to_string(),
            },
            Value::SmallInt(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::BigInt(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Decimal(s) => s.clone(),
            Value::Text(s)
            | Value::Date(s)
            | Value::Time(s)
            | Value::Timestamp(s)
            | Value::Uuid(s) => self.quote_string(s),
            Value::Json(j) => self.quote_string(&j.to_string()),
            Value::Bytes(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                match self {
                    Dialect::Postgres => format!("E'\\\\x{}'", hex),
                    Dialect::Sqlite | Dialect::Mysql => format!("X'{}'", hex),
                }
            }
            Value::Array(items) => {
                let inner = items
                    .iter()
                    .map(|v| self.escape(v))
                    .collect::<Vec<_>>()
                    .join(", ");
                match self {
                    Dialect::Postgres => format!("ARRAY[{}]", inner),
                    Dialect::Sqlite | Dialect::Mysql => inner,
                }
            }
        }
    }

    fn quote_string(self, s: &str) -> String {
        let mut escaped = s.replace('\'', "''");
        if self == Dialect::Mysql {
            escaped = escaped.replace('\\', "\\\\");
        }
        format!("'{}'", escaped)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            other => Err(crate::Error::config(
                crate::error::ConfigErrorKind::InvalidOption,
                format!("unsupported dialect '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_per_dialect() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Sqlite.placeholder(3), "?3");
        assert_eq!(Dialect::Mysql.placeholder(3), "?");
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(Dialect::Postgres.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::Mysql.quote_identifier("a`b"), "`a``b`");
        assert_eq!(Dialect::Postgres.quote_identifiers("s.t"), "\"s\".\"t\"");
    }

    #[test]
    fn schema_qualified_tables() {
        assert_eq!(
            Dialect::Postgres.quote_table(Some("app"), "users"),
            "\"app\".\"users\""
        );
        assert_eq!(
            Dialect::Sqlite.quote_table(Some("app"), "users"),
            "\"app.users\""
        );
        assert_eq!(Dialect::Mysql.quote_table(None, "users"), "`users`");
    }

    #[test]
    fn escape_literals() {
        assert_eq!(Dialect::Postgres.escape(&Value::Text("it's".into())), "'it''s'");
        assert_eq!(Dialect::Mysql.escape(&Value::Text("a\\b".into())), "'a\\\\b'");
        assert_eq!(Dialect::Sqlite.escape(&Value::Bool(true)), "1");
        assert_eq!(Dialect::Postgres.escape(&Value::Bool(false)), "false");
        assert_eq!(Dialect::Sqlite.escape(&Value::Bytes(vec![0xab, 0x01])), "X'ab01'");
        assert_eq!(Dialect::Mysql.escape(&Value::Null), "NULL");
    }

    #[test]
    fn parse_dialect_names() {
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert!("oracle".parse::<Dialect>().is_err());
    }
}
