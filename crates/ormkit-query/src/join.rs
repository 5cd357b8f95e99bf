//! JOIN clauses.

use crate::expr::Expr;
use ormkit_core::{Dialect, TableRef, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
}

impl JoinType {
    pub const fn as_str(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT OUTER JOIN",
        }
    }
}

/// A JOIN against a table, optionally aliased.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub alias: Option<String>,
    pub on: Expr,
}

impl Join {
    pub fn inner(table: impl Into<TableRef>, on: Expr) -> Self {
        Self {
            join_type: JoinType::Inner,
            table: table.into(),
            alias: None,
            on,
        }
    }

    pub fn left(table: impl Into<TableRef>, on: Expr) -> Self {
        Self {
            join_type: JoinType::Left,
            table: table.into(),
            alias: None,
            on,
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn build(&self, dialect: Dialect, params: &mut Vec<Value>) -> String {
        let mut sql = format!("{} {}", self.join_type.as_str(), self.table.quoted(dialect));
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(&dialect.quote_identifier(alias));
        }
        sql.push_str(" ON ");
        sql.push_str(&self.on.build_with_dialect(dialect, params, 0));
        sql
    }
}
