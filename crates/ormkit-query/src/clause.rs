//! SQL clause types (WHERE, ORDER BY).

use crate::expr::Expr;
use ormkit_core::{Dialect, Value};

/// WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    expr: Expr,
}

impl Where {
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }

    /// Add an AND condition.
    pub fn and(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.and(expr),
        }
    }

    /// Add an OR condition.
    pub fn or(self, expr: Expr) -> Self {
        Self {
            expr: self.expr.or(expr),
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Whether the clause filters nothing and can be omitted.
    pub fn is_empty(&self) -> bool {
        self.expr.is_empty_and()
    }

    /// Build the WHERE clause with a parameter offset.
    pub fn build_with_offset(&self, dialect: Dialect, offset: usize) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.expr.build_with_dialect(dialect, &mut params, offset);
        (sql, params)
    }

    /// Append ` WHERE ...` to `sql` unless the clause is empty.
    pub(crate) fn append_to(&self, sql: &mut String, dialect: Dialect, params: &mut Vec<Value>) {
        if self.is_empty() {
            return;
        }
        sql.push_str(" WHERE ");
        sql.push_str(&self.expr.build_with_dialect(dialect, params, 0));
    }
}

impl From<Expr> for Where {
    fn from(expr: Expr) -> Self {
        Where::new(expr)
    }
}

/// ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    expr: Expr,
    direction: OrderDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderBy {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: OrderDirection::Desc,
        }
    }

    pub fn build(&self, dialect: Dialect, params: &mut Vec<Value>) -> String {
        let dir = match self.direction {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        };
        format!("{} {}", self.expr.build_with_dialect(dialect, params, 0), dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_with_offset() {
        let clause = Where::new(Expr::col("id").eq(1)).and(Expr::col("active").eq(true));
        let (sql, params) = clause.build_with_offset(Dialect::Postgres, 2);
        assert_eq!(sql, "\"id\" = $3 AND \"active\" = $4");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn empty_where_is_omitted() {
        let mut sql = String::from("SELECT 1");
        let mut params = Vec::new();
        Where::new(Expr::And(vec![])).append_to(&mut sql, Dialect::Sqlite, &mut params);
        assert_eq!(sql, "SELECT 1");
    }

    #[test]
    fn order_by_direction() {
        let mut params = Vec::new();
        assert_eq!(
            OrderBy::desc(Expr::col("rank")).build(Dialect::Mysql, &mut params),
            "`rank` DESC"
        );
    }
}
