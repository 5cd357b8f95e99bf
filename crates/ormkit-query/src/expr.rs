//! SQL expressions for WHERE and ON clauses.

use ormkit_core::{AttributeValues, Dialect, Value};

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference with optional table qualifier
    Column {
        table: Option<String>,
        name: String,
    },

    /// Literal value, always bound as a parameter
    Literal(Value),

    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// `expr [NOT] IN (values)`
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },

    Not(Box<Expr>),

    /// Conjunction; an empty list is always true
    And(Vec<Expr>),

    /// Disjunction; an empty list is always false
    Or(Vec<Expr>),

    Function {
        name: String,
        args: Vec<Expr>,
    },

    /// Raw SQL, inserted verbatim
    Raw(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Like,
}

impl BinaryOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Like => "LIKE",
        }
    }
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(other.into()),
        }
    }

    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, other)
    }

    pub fn add(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Add, other)
    }

    pub fn like(self, pattern: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Like, pattern)
    }

    pub fn in_list<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Expr>,
    {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Combine with AND, flattening nested conjunctions.
    pub fn and(self, other: Expr) -> Self {
        let mut parts = match self {
            Expr::And(parts) => parts,
            other => vec![other],
        };
        match other {
            Expr::And(more) => parts.extend(more),
            other => parts.push(other),
        }
        Expr::And(parts)
    }

    /// Combine with OR, flattening nested disjunctions.
    pub fn or(self, other: Expr) -> Self {
        let mut parts = match self {
            Expr::Or(parts) => parts,
            other => vec![other],
        };
        match other {
            Expr::Or(more) => parts.extend(more),
            other => parts.push(other),
        }
        Expr::Or(parts)
    }

    /// AND over all parts, skipping empty conjunctions.
    pub fn all<I: IntoIterator<Item = Expr>>(parts: I) -> Self {
        Expr::And(parts.into_iter().filter(|e| !e.is_empty_and()).collect())
    }

    pub fn any<I: IntoIterator<Item = Expr>>(parts: I) -> Self {
        Expr::Or(parts.into_iter().collect())
    }

    /// Equality match on every attribute of the bag.
    ///
    /// `Null` becomes `IS NULL` and `Array` becomes an IN list.
    pub fn matching(table: Option<&str>, values: &AttributeValues) -> Self {
        Expr::And(
            values
                .iter()
                .map(|(name, value)| {
                    let column = match table {
                        Some(t) => Expr::qualified(t, name.as_str()),
                        None => Expr::col(name.as_str()),
                    };
                    match value {
                        Value::Null => column.is_null(),
                        Value::Array(items) => column.in_list(items.iter().cloned()),
                        other => column.eq(other.clone()),
                    }
                })
                .collect(),
        )
    }

    /// True for a conjunction with nothing in it.
    pub fn is_empty_and(&self) -> bool {
        matches!(self, Expr::And(parts) if parts.iter().all(Expr::is_empty_and))
    }

    /// Build SQL with `$n` placeholders.
    pub fn build(&self, params: &mut Vec<Value>, offset: usize) -> String {
        self.build_with_dialect(Dialect::Postgres, params, offset)
    }

    /// Build SQL for a dialect, appending bound values to `params`.
    ///
    /// Placeholders are numbered `offset + params.len()`, so callers
    /// assembling a statement from several pieces share one `params`.
    pub fn build_with_dialect(
        &self,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        match self {
            Expr::Column { table, name } => match table {
                Some(t) => format!(
                    "{}.{}",
                    dialect.quote_identifier(t),
                    dialect.quote_identifier(name)
                ),
                None => dialect.quote_identifier(name),
            },

            Expr::Literal(value) => {
                if matches!(value, Value::Default) {
                    "DEFAULT".to_string()
                } else {
                    params.push(value.clone());
                    dialect.placeholder(offset + params.len())
                }
            }

            Expr::Binary { left, op, right } => {
                let left_sql = left.build_with_dialect(dialect, params, offset);
                let right_sql = right.build_with_dialect(dialect, params, offset);
                format!("{left_sql} {} {right_sql}", op.as_str())
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                // x IN () is not valid SQL
                if values.is_empty() {
                    return if *negated { "1 = 1" } else { "1 = 0" }.to_string();
                }
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                let value_sqls: Vec<_> = values
                    .iter()
                    .map(|v| v.build_with_dialect(dialect, params, offset))
                    .collect();
                let not_str = if *negated { "NOT " } else { "" };
                format!("{expr_sql} {not_str}IN ({})", value_sqls.join(", "))
            }

            Expr::IsNull { expr, negated } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                let not_str = if *negated { " NOT" } else { "" };
                format!("{expr_sql} IS{not_str} NULL")
            }

            Expr::Not(expr) => {
                format!("NOT ({})", expr.build_with_dialect(dialect, params, offset))
            }

            Expr::And(parts) => Self::build_group(parts, " AND ", "1 = 1", dialect, params, offset),

            Expr::Or(parts) => Self::build_group(parts, " OR ", "1 = 0", dialect, params, offset),

            Expr::Function { name, args } => {
                let arg_sqls: Vec<_> = args
                    .iter()
                    .map(|a| a.build_with_dialect(dialect, params, offset))
                    .collect();
                format!("{name}({})", arg_sqls.join(", "))
            }

            Expr::Raw(sql) => sql.clone(),
        }
    }

    fn build_group(
        parts: &[Expr],
        separator: &str,
        empty: &str,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        let parts: Vec<&Expr> = parts.iter().filter(|p| !p.is_empty_and()).collect();
        match parts.as_slice() {
            [] => empty.to_string(),
            [single] => single.build_with_dialect(dialect, params, offset),
            many => {
                let sqls: Vec<String> = many
                    .iter()
                    .map(|p| {
                        let sql = p.build_with_dialect(dialect, params, offset);
                        if matches!(p, Expr::And(_) | Expr::Or(_)) {
                            format!("({sql})")
                        } else {
                            sql
                        }
                    })
                    .collect();
                sqls.join(separator)
            }
        }
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Literal(Value::Text(s.to_string()))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Value::Text(s))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Literal(Value::Int(n))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Literal(Value::BigInt(n))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Literal(Value::Bool(b))
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Literal(Value::Double(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_and_literal() {
        let mut params = Vec::new();
        let sql = Expr::qualified("PostTag", "PostId")
            .eq(5)
            .build_with_dialect(Dialect::Sqlite, &mut params, 0);
        assert_eq!(sql, "\"PostTag\".\"PostId\" = ?1");
        assert_eq!(params, vec![Value::Int(5)]);
    }

    #[test]
    fn or_groups_are_parenthesized_inside_and() {
        let expr = Expr::col("a")
            .eq(1)
            .and(Expr::col("b").eq(2).or(Expr::col("c").eq(3)));
        let mut params = Vec::new();
        let sql = expr.build(&mut params, 0);
        assert_eq!(sql, "\"a\" = $1 AND (\"b\" = $2 OR \"c\" = $3)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn empty_groups_and_lists() {
        let mut params = Vec::new();
        assert_eq!(Expr::And(vec![]).build(&mut params, 0), "1 = 1");
        assert_eq!(Expr::Or(vec![]).build(&mut params, 0), "1 = 0");
        assert_eq!(
            Expr::col("id")
                .in_list(Vec::<Value>::new())
                .build(&mut params, 0),
            "1 = 0"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn all_skips_empty_conjunctions() {
        let expr = Expr::all([Expr::And(vec![]), Expr::col("x").eq(1), Expr::And(vec![])]);
        let mut params = Vec::new();
        assert_eq!(expr.build(&mut params, 0), "\"x\" = $1");
    }

    #[test]
    fn matching_handles_null_and_arrays() {
        let mut values = AttributeValues::new();
        values.insert("deleted".into(), Value::Null);
        values.insert(
            "id".into(),
            Value::Array(vec![Value::Int(1), Value::Int(2)]),
        );
        let mut params = Vec::new();
        let sql = Expr::matching(Some("t"), &values).build_with_dialect(
            Dialect::Mysql,
            &mut params,
            0,
        );
        assert_eq!(sql, "`t`.`deleted` IS NULL AND `t`.`id` IN (?, ?)");
        assert_eq!(params, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn offset_continues_numbering() {
        let mut params = Vec::new();
        let sql = Expr::col("a").eq(1).build_with_dialect(Dialect::Sqlite, &mut params, 3);
        assert_eq!(sql, "\"a\" = ?4");
    }

    #[test]
    fn default_literal_is_not_bound() {
        let mut params = Vec::new();
        assert_eq!(Expr::Literal(Value::Default).build(&mut params, 0), "DEFAULT");
        assert!(params.is_empty());
    }
}
