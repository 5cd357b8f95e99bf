//! Attribute data types and their SQL spelling.

use crate::dialect::Dialect;

/// Logical data type of a model attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    /// Variable length string, `VARCHAR(n)`
    String(u32),
    Char(u32),
    Text,
    Integer,
    BigInt,
    SmallInt,
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },
    Boolean,
    /// Date and time
    Date,
    /// Calendar date without time
    DateOnly,
    Time,
    Uuid,
    Json,
    Blob,
    /// Enumerated labels
    Enum(Vec<String>),
    /// A column type exactly as the database reported it
    Raw(String),
}

impl Default for DataType {
    fn default() -> Self {
        DataType::String(255)
    }
}

impl DataType {
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DataType::Enum(values.into_iter().map(Into::into).collect())
    }

    pub const fn is_enum(&self) -> bool {
        matches!(self, DataType::Enum(_))
    }

    pub fn enum_values(&self) -> Option<&[String]> {
        match self {
            DataType::Enum(values) => Some(values),
            _ => None,
        }
    }

    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Integer | DataType::BigInt | DataType::SmallInt
        )
    }

    /// Get the column type for this dialect.
    ///
    /// PostgreSQL enums are named types created per table and column, so the
    /// DDL layer spells them itself; here they fall back to `TEXT`.
    pub fn sql_name(&self, dialect: Dialect) -> String {
        match self {
            DataType::String(len) => format!("VARCHAR({})", len),
            DataType::Char(len) => format!("CHAR({})", len),
            DataType::Text => "TEXT".to_string(),
            DataType::Integer => "INTEGER".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::Float => match dialect {
                Dialect::Postgres => "REAL".to_string(),
                Dialect::Sqlite | Dialect::Mysql => "FLOAT".to_string(),
            },
            DataType::Double => match dialect {
                Dialect::Postgres => "DOUBLE PRECISION".to_string(),
                Dialect::Sqlite => "REAL".to_string(),
                Dialect::Mysql => "DOUBLE".to_string(),
            },
            DataType::Decimal { precision, scale } => {
                format!("DECIMAL({},{})", precision, scale)
            }
            DataType::Boolean => match dialect {
                Dialect::Mysql => "TINYINT(1)".to_string(),
                Dialect::Postgres | Dialect::Sqlite => "BOOLEAN".to_string(),
            },
            DataType::Date => match dialect {
                Dialect::Postgres => "TIMESTAMP WITH TIME ZONE".to_string(),
                Dialect::Sqlite | Dialect::Mysql => "DATETIME".to_string(),
            },
            DataType::DateOnly => "DATE".to_string(),
            DataType::Time => "TIME".to_string(),
            DataType::Uuid => match dialect {
                Dialect::Postgres => "UUID".to_string(),
                Dialect::Sqlite | Dialect::Mysql => "CHAR(36)".to_string(),
            },
            DataType::Json => match dialect {
                Dialect::Postgres | Dialect::Mysql => "JSON".to_string(),
                Dialect::Sqlite => "TEXT".to_string(),
            },
            DataType::Blob => match dialect {
                Dialect::Postgres => "BYTEA".to_string(),
                Dialect::Sqlite | Dialect::Mysql => "BLOB".to_string(),
            },
            DataType::Enum(values) => match dialect {
                Dialect::Mysql => format!(
                    "ENUM({})",
                    values
                        .iter()
                        .map(|v| dialect.escape(&v.as_str().into()))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                Dialect::Postgres | Dialect::Sqlite => "TEXT".to_string(),
            },
            DataType::Raw(sql) => sql.clone(),
        }
    }
}

/// Referential action for foreign key constraints (ON DELETE / ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }

    /// Parse a referential action from a string (case-insensitive).
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NO ACTION" | "NOACTION" | "NO_ACTION" => Some(ReferentialAction::NoAction),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET NULL" | "SETNULL" | "SET_NULL" => Some(ReferentialAction::SetNull),
            "SET DEFAULT" | "SETDEFAULT" | "SET_DEFAULT" => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_names_follow_dialect() {
        assert_eq!(DataType::String(64).sql_name(Dialect::Sqlite), "VARCHAR(64)");
        assert_eq!(DataType::Blob.sql_name(Dialect::Postgres), "BYTEA");
        assert_eq!(DataType::Boolean.sql_name(Dialect::Mysql), "TINYINT(1)");
        assert_eq!(
            DataType::enumeration(["a", "b"]).sql_name(Dialect::Mysql),
            "ENUM('a', 'b')"
        );
    }

    #[test]
    fn referential_action_parsing() {
        assert_eq!(
            ReferentialAction::from_str("set null"),
            Some(ReferentialAction::SetNull)
        );
        assert_eq!(ReferentialAction::from_str("explode"), None);
        assert_eq!(ReferentialAction::Cascade.as_sql(), "CASCADE");
    }
}
