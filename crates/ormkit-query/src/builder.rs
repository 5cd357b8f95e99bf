//! DML statement builders (INSERT, UPDATE, DELETE, upsert, increment).
//!
//! Each builder takes field names as they exist in the table and renders
//! a complete statement plus its bound parameters for one dialect.

use crate::clause::Where;
use crate::expr::Expr;
use ormkit_core::{AttributeValues, Dialect, TableRef, Value};

fn quoted_list(dialect: Dialect, names: &[String]) -> String {
    names
        .iter()
        .map(|n| dialect.quote_identifier(n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn returning_clause(dialect: Dialect, returning: &[String]) -> String {
    if returning.is_empty() || !dialect.supports_returning() {
        return String::new();
    }
    let cols = if returning.iter().any(|r| r == "*") {
        "*".to_string()
    } else {
        quoted_list(dialect, returning)
    };
    format!(" RETURNING {cols}")
}

fn merge_filter(existing: Option<Where>, expr: Expr) -> Option<Where> {
    Some(match existing {
        Some(w) => w.and(expr),
        None => Where::new(expr),
    })
}

/// INSERT of one or more rows.
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: TableRef,
    rows: Vec<AttributeValues>,
    returning: Vec<String>,
    ignore_duplicates: bool,
}

impl InsertBuilder {
    pub fn new(table: impl Into<TableRef>) -> Self {
        Self {
            table: table.into(),
            rows: Vec::new(),
            returning: Vec::new(),
            ignore_duplicates: false,
        }
    }

    #[must_use]
    pub fn row(mut self, values: AttributeValues) -> Self {
        self.rows.push(values);
        self
    }

    #[must_use]
    pub fn rows<I: IntoIterator<Item = AttributeValues>>(mut self, rows: I) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Add a RETURNING column (ignored where the dialect has none).
    #[must_use]
    pub fn returning(mut self, column: impl Into<String>) -> Self {
        self.returning.push(column.into());
        self
    }

    /// Skip rows that would violate a unique constraint.
    #[must_use]
    pub const fn ignore_duplicates(mut self, ignore: bool) -> Self {
        self.ignore_duplicates = ignore;
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Union of all row keys in first-appearance order.
    fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let verb = match (self.ignore_duplicates, dialect) {
            (true, Dialect::Sqlite) => "INSERT OR IGNORE INTO",
            (true, Dialect::Mysql) => "INSERT IGNORE INTO",
            _ => "INSERT INTO",
        };
        let table = self.table.quoted(dialect);
        let columns = self.columns();

        if columns.is_empty() {
            let sql = match dialect {
                Dialect::Mysql => format!("{verb} {table} () VALUES ()"),
                Dialect::Postgres | Dialect::Sqlite => format!("{verb} {table} DEFAULT VALUES"),
            };
            return (
                format!("{sql}{};", returning_clause(dialect, &self.returning)),
                Vec::new(),
            );
        }

        let mut params = Vec::new();
        let tuples: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let cells: Vec<String> = columns
                    .iter()
                    .map(|column| match row.get(column) {
                        Some(Value::Default) | None if dialect != Dialect::Sqlite => {
                            "DEFAULT".to_string()
                        }
                        // SQLite has no DEFAULT keyword inside VALUES
                        Some(Value::Default) | None => "NULL".to_string(),
                        Some(value) => {
                            params.push(value.clone());
                            dialect.placeholder(params.len())
                        }
                    })
                    .collect();
                format!("({})", cells.join(", "))
            })
            .collect();

        let mut sql = format!(
            "{verb} {table} ({}) VALUES {}",
            quoted_list(dialect, &columns),
            tuples.join(", ")
        );
        if self.ignore_duplicates && dialect == Dialect::Postgres {
            sql.push_str(" ON CONFLICT DO NOTHING");
        }
        sql.push_str(&returning_clause(dialect, &self.returning));
        sql.push(';');
        (sql, params)
    }
}

/// UPDATE of the rows matching a filter.
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: TableRef,
    sets: Vec<(String, Expr)>,
    where_clause: Option<Where>,
    returning: Vec<String>,
}

impl UpdateBuilder {
    pub fn new(table: impl Into<TableRef>) -> Self {
        Self {
            table: table.into(),
            sets: Vec::new(),
            where_clause: None,
            returning: Vec::new(),
        }
    }

    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.sets.push((column.into(), value.into()));
        self
    }

    /// Set every attribute of the bag to its literal value.
    #[must_use]
    pub fn set_all(mut self, values: &AttributeValues) -> Self {
        self.sets.extend(
            values
                .iter()
                .map(|(k, v)| (k.clone(), Expr::lit(v.clone()))),
        );
        self
    }

    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = merge_filter(self.where_clause, expr);
        self
    }

    #[must_use]
    pub fn returning(mut self, column: impl Into<String>) -> Self {
        self.returning.push(column.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let assignments: Vec<String> = self
            .sets
            .iter()
            .map(|(column, value)| {
                format!(
                    "{} = {}",
                    dialect.quote_identifier(column),
                    value.build_with_dialect(dialect, &mut params, 0)
                )
            })
            .collect();
        let mut sql = format!(
            "UPDATE {} SET {}",
            self.table.quoted(dialect),
            assignments.join(", ")
        );
        if let Some(where_clause) = &self.where_clause {
            where_clause.append_to(&mut sql, dialect, &mut params);
        }
        sql.push_str(&returning_clause(dialect, &self.returning));
        sql.push(';');
        (sql, params)
    }
}

/// DELETE of the rows matching a filter, optionally limited.
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    table: TableRef,
    where_clause: Option<Where>,
    limit: Option<u64>,
}

impl DeleteBuilder {
    pub fn new(table: impl Into<TableRef>) -> Self {
        Self {
            table: table.into(),
            where_clause: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = merge_filter(self.where_clause, expr);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let table = self.table.quoted(dialect);
        let mut filter = String::new();
        if let Some(where_clause) = &self.where_clause {
            where_clause.append_to(&mut filter, dialect, &mut params);
        }

        let sql = match (self.limit, dialect) {
            (None, _) => format!("DELETE FROM {table}{filter};"),
            (Some(n), Dialect::Mysql) => format!("DELETE FROM {table}{filter} LIMIT {n};"),
            // no DELETE ... LIMIT without a compile-time option; go through the row id
            (Some(n), Dialect::Sqlite) => format!(
                "DELETE FROM {table} WHERE rowid IN (SELECT rowid FROM {table}{filter} LIMIT {n});"
            ),
            (Some(n), Dialect::Postgres) => format!(
                "DELETE FROM {table} WHERE ctid IN (SELECT ctid FROM {table}{filter} LIMIT {n});"
            ),
        };
        (sql, params)
    }
}

/// INSERT that updates the existing row on a unique conflict.
#[derive(Debug, Clone)]
pub struct UpsertBuilder {
    table: TableRef,
    insert: AttributeValues,
    update: AttributeValues,
    conflict: Vec<String>,
}

impl UpsertBuilder {
    /// Column name under which Postgres reports whether the row was new.
    pub const INSERTED_COLUMN: &'static str = "inserted";

    pub fn new(table: impl Into<TableRef>) -> Self {
        Self {
            table: table.into(),
            insert: AttributeValues::new(),
            update: AttributeValues::new(),
            conflict: Vec::new(),
        }
    }

    #[must_use]
    pub fn insert_values(mut self, values: AttributeValues) -> Self {
        self.insert = values;
        self
    }

    #[must_use]
    pub fn update_values(mut self, values: AttributeValues) -> Self {
        self.update = values;
        self
    }

    /// Columns forming the unique key the conflict is detected on.
    #[must_use]
    pub fn conflict_on<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflict = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let columns: Vec<String> = self.insert.keys().cloned().collect();
        let placeholders: Vec<String> = self
            .insert
            .values()
            .map(|v| {
                params.push(v.clone());
                dialect.placeholder(params.len())
            })
            .collect();
        let table = self.table.quoted(dialect);
        let mut sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            quoted_list(dialect, &columns),
            placeholders.join(", ")
        );

        let updates: Vec<&String> = self.update.keys().collect();
        match dialect {
            Dialect::Mysql => {
                let sets: Vec<String> = if updates.is_empty() {
                    // keep the statement valid; a no-op assignment
                    columns
                        .first()
                        .map(|c| {
                            let q = dialect.quote_identifier(c);
                            vec![format!("{q} = {q}")]
                        })
                        .unwrap_or_default()
                } else {
                    updates
                        .iter()
                        .map(|c| {
                            let q = dialect.quote_identifier(c);
                            format!("{q} = VALUES({q})")
                        })
                        .collect()
                };
                sql.push_str(" ON DUPLICATE KEY UPDATE ");
                sql.push_str(&sets.join(", "));
            }
            Dialect::Postgres | Dialect::Sqlite => {
                let excluded = if dialect == Dialect::Postgres {
                    "EXCLUDED"
                } else {
                    "excluded"
                };
                let target = if dialect == Dialect::Postgres {
                    format!(" ({})", quoted_list(dialect, &self.conflict))
                } else {
                    format!("({})", quoted_list(dialect, &self.conflict))
                };
                sql.push_str(" ON CONFLICT");
                sql.push_str(&target);
                if updates.is_empty() {
                    sql.push_str(" DO NOTHING");
                } else {
                    let sets: Vec<String> = updates
                        .iter()
                        .map(|c| {
                            let q = dialect.quote_identifier(c);
                            format!("{q} = {excluded}.{q}")
                        })
                        .collect();
                    sql.push_str(" DO UPDATE SET ");
                    sql.push_str(&sets.join(", "));
                }
                if dialect == Dialect::Postgres {
                    sql.push_str(&format!(
                        " RETURNING (xmax = 0) AS {}",
                        dialect.quote_identifier(Self::INSERTED_COLUMN)
                    ));
                }
            }
        }
        sql.push(';');
        (sql, params)
    }
}

/// `UPDATE t SET a = a + ?` for numeric counters.
#[derive(Debug, Clone)]
pub struct IncrementBuilder {
    table: TableRef,
    by: Vec<(String, Value)>,
    extra: AttributeValues,
    where_clause: Option<Where>,
}

impl IncrementBuilder {
    pub fn new(table: impl Into<TableRef>) -> Self {
        Self {
            table: table.into(),
            by: Vec::new(),
            extra: AttributeValues::new(),
            where_clause: None,
        }
    }

    #[must_use]
    pub fn by(mut self, column: impl Into<String>, amount: impl Into<Value>) -> Self {
        self.by.push((column.into(), amount.into()));
        self
    }

    /// Plain assignments applied alongside the increments.
    #[must_use]
    pub fn extra(mut self, values: AttributeValues) -> Self {
        self.extra = values;
        self
    }

    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = merge_filter(self.where_clause, expr);
        self
    }

    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut update = UpdateBuilder::new(&self.table);
        for (column, amount) in &self.by {
            update = update.set(column.as_str(), Expr::col(column.as_str()).add(amount.clone()));
        }
        update = update.set_all(&self.extra);
        if let Some(where_clause) = &self.where_clause {
            update = update.filter(where_clause.expr().clone());
        }
        update.build_with_dialect(dialect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(pairs: &[(&str, Value)]) -> AttributeValues {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn bulk_insert_fills_missing_columns() {
        let builder = InsertBuilder::new("PostTags")
            .row(bag(&[("PostId", Value::Int(1)), ("TagId", Value::Int(2))]))
            .row(bag(&[("PostId", Value::Int(1)), ("role", Value::Text("x".into()))]));

        let (sql, params) = builder.build_with_dialect(Dialect::Postgres);
        assert_eq!(
            sql,
            "INSERT INTO \"PostTags\" (\"PostId\", \"TagId\", \"role\") VALUES ($1, $2, DEFAULT), ($3, DEFAULT, $4);"
        );
        assert_eq!(params.len(), 4);

        let (sql, _) = builder.build_with_dialect(Dialect::Sqlite);
        assert!(sql.contains("(?1, ?2, NULL), (?3, NULL, ?4)"));
    }

    #[test]
    fn insert_ignore_per_dialect() {
        let builder = InsertBuilder::new("t")
            .row(bag(&[("a", Value::Int(1))]))
            .ignore_duplicates(true);
        assert!(
            builder
                .build_with_dialect(Dialect::Sqlite)
                .0
                .starts_with("INSERT OR IGNORE INTO")
        );
        assert!(
            builder
                .build_with_dialect(Dialect::Mysql)
                .0
                .starts_with("INSERT IGNORE INTO")
        );
        assert!(
            builder
                .build_with_dialect(Dialect::Postgres)
                .0
                .ends_with("ON CONFLICT DO NOTHING;")
        );
    }

    #[test]
    fn insert_with_returning() {
        let (sql, _) = InsertBuilder::new("users")
            .row(bag(&[("name", Value::Text("a".into()))]))
            .returning("*")
            .build_with_dialect(Dialect::Postgres);
        assert_eq!(sql, "INSERT INTO \"users\" (\"name\") VALUES ($1) RETURNING *;");

        let (sql, _) = InsertBuilder::new("users")
            .row(bag(&[("name", Value::Text("a".into()))]))
            .returning("*")
            .build_with_dialect(Dialect::Mysql);
        assert_eq!(sql, "INSERT INTO `users` (`name`) VALUES (?);");
    }

    #[test]
    fn update_numbers_set_before_where() {
        let (sql, params) = UpdateBuilder::new("PostTags")
            .set_all(&bag(&[("role", Value::Text("owner".into()))]))
            .filter(Expr::col("PostId").eq(1))
            .filter(Expr::col("TagId").in_list([2, 3]))
            .build_with_dialect(Dialect::Postgres);
        assert_eq!(
            sql,
            "UPDATE \"PostTags\" SET \"role\" = $1 WHERE \"PostId\" = $2 AND \"TagId\" IN ($3, $4);"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn delete_with_limit_per_dialect() {
        let builder = DeleteBuilder::new("users")
            .filter(Expr::col("id").eq(5))
            .limit(Some(1));
        assert_eq!(
            builder.build_with_dialect(Dialect::Mysql).0,
            "DELETE FROM `users` WHERE `id` = ? LIMIT 1;"
        );
        assert_eq!(
            builder.build_with_dialect(Dialect::Sqlite).0,
            "DELETE FROM \"users\" WHERE rowid IN (SELECT rowid FROM \"users\" WHERE \"id\" = ?1 LIMIT 1);"
        );
        assert_eq!(
            DeleteBuilder::new("users").build_with_dialect(Dialect::Postgres).0,
            "DELETE FROM \"users\";"
        );
    }

    #[test]
    fn upsert_per_dialect() {
        let builder = UpsertBuilder::new("users")
            .insert_values(bag(&[
                ("email", Value::Text("a@b".into())),
                ("name", Value::Text("A".into())),
            ]))
            .update_values(bag(&[("name", Value::Text("A".into()))]))
            .conflict_on(["email"]);

        assert_eq!(
            builder.build_with_dialect(Dialect::Postgres).0,
            "INSERT INTO \"users\" (\"email\", \"name\") VALUES ($1, $2) ON CONFLICT (\"email\") DO UPDATE SET \"name\" = EXCLUDED.\"name\" RETURNING (xmax = 0) AS \"inserted\";"
        );
        assert_eq!(
            builder.build_with_dialect(Dialect::Sqlite).0,
            "INSERT INTO \"users\" (\"email\", \"name\") VALUES (?1, ?2) ON CONFLICT(\"email\") DO UPDATE SET \"name\" = excluded.\"name\";"
        );
        assert_eq!(
            builder.build_with_dialect(Dialect::Mysql).0,
            "INSERT INTO `users` (`email`, `name`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `name` = VALUES(`name`);"
        );
    }

    #[test]
    fn increment_adds_to_column() {
        let (sql, params) = IncrementBuilder::new("posts")
            .by("views", 2_i64)
            .filter(Expr::col("id").eq(9))
            .build_with_dialect(Dialect::Sqlite);
        assert_eq!(
            sql,
            "UPDATE \"posts\" SET \"views\" = \"views\" + ?1 WHERE \"id\" = ?2;"
        );
        assert_eq!(params, vec![Value::BigInt(2), Value::Int(9)]);
    }
}
