//! SELECT statements.

use crate::clause::{OrderBy, Where};
use crate::expr::Expr;
use crate::join::Join;
use ormkit_core::{Dialect, TableRef, Value};

/// One entry of the select list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumn {
    /// `*` or `table.*`
    All(Option<String>),
    Expr { expr: Expr, alias: Option<String> },
}

/// SELECT statement over one table plus joins.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    table: TableRef,
    alias: Option<String>,
    columns: Vec<SelectColumn>,
    joins: Vec<Join>,
    where_clause: Option<Where>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Select {
    pub fn from(table: impl Into<TableRef>) -> Self {
        Self {
            table: table.into(),
            alias: None,
            columns: Vec::new(),
            joins: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn column(mut self, column: SelectColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Select named columns of the base table.
    #[must_use]
    pub fn columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns
            .extend(names.into_iter().map(|name| SelectColumn::Expr {
                expr: Expr::col(name),
                alias: None,
            }));
        self
    }

    #[must_use]
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Add a WHERE condition, AND-ed with any existing one.
    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(expr),
            None => Where::new(expr),
        });
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| match c {
                    SelectColumn::All(None) => "*".to_string(),
                    SelectColumn::All(Some(table)) => {
                        format!("{}.*", dialect.quote_identifier(table))
                    }
                    SelectColumn::Expr { expr, alias } => {
                        let sql = expr.build_with_dialect(dialect, &mut params, 0);
                        match alias {
                            Some(alias) => {
                                format!("{} AS {}", sql, dialect.quote_identifier(alias))
                            }
                            None => sql,
                        }
                    }
                })
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", columns, self.table.quoted(dialect));
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(&dialect.quote_identifier(alias));
        }
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.build(dialect, &mut params));
        }
        if let Some(where_clause) = &self.where_clause {
            where_clause.append_to(&mut sql, dialect, &mut params);
        }
        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|o| o.build(dialect, &mut params))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => match dialect {
                Dialect::Postgres => sql.push_str(&format!(" OFFSET {offset}")),
                // a LIMIT is mandatory before OFFSET
                Dialect::Sqlite => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
                Dialect::Mysql => {
                    sql.push_str(&format!(" LIMIT 18446744073709551615 OFFSET {offset}"));
                }
            },
            (None, None) => {}
        }
        sql.push(';');
        (sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_all_with_filter_and_order() {
        let (sql, params) = Select::from("Tags")
            .filter(Expr::col("name").like("a%"))
            .order_by(OrderBy::asc(Expr::col("id")))
            .limit(10)
            .build_with_dialect(Dialect::Postgres);
        assert_eq!(
            sql,
            "SELECT * FROM \"Tags\" WHERE \"name\" LIKE $1 ORDER BY \"id\" ASC LIMIT 10;"
        );
        assert_eq!(params, vec![Value::Text("a%".into())]);
    }

    #[test]
    fn join_params_precede_where_params() {
        let (sql, params) = Select::from("Tags")
            .column(SelectColumn::All(Some("Tags".into())))
            .column(SelectColumn::Expr {
                expr: Expr::qualified("PostTag", "role"),
                alias: Some("PostTag.role".into()),
            })
            .join(
                Join::inner(
                    "PostTags",
                    Expr::qualified("Tags", "id")
                        .eq(Expr::qualified("PostTag", "TagId"))
                        .and(Expr::qualified("PostTag", "PostId").eq(7)),
                )
                .alias("PostTag"),
            )
            .filter(Expr::qualified("Tags", "name").eq("rust"))
            .build_with_dialect(Dialect::Sqlite);
        assert_eq!(
            sql,
            "SELECT \"Tags\".*, \"PostTag\".\"role\" AS \"PostTag.role\" FROM \"Tags\" INNER JOIN \"PostTags\" AS \"PostTag\" ON \"Tags\".\"id\" = \"PostTag\".\"TagId\" AND \"PostTag\".\"PostId\" = ?1 WHERE \"Tags\".\"name\" = ?2;"
        );
        assert_eq!(params, vec![Value::Int(7), Value::Text("rust".into())]);
    }

    #[test]
    fn offset_without_limit() {
        let (sql, _) = Select::from("t").offset(5).build_with_dialect(Dialect::Sqlite);
        assert_eq!(sql, "SELECT * FROM \"t\" LIMIT -1 OFFSET 5;");
    }
}
