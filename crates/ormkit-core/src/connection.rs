//! The execution driver seam.
//!
//! [`Connection`] is everything the query interface needs from a database
//! driver: run a statement, get rows, rows affected or the generated id.
//! All operations integrate with asupersync via `Cx` for cancellation.

use crate::dialect::Dialect;
use crate::error::Result;
use crate::row::Row;
use crate::value::Value;
use asupersync::{Cx, Outcome};

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Dirty reads, non-repeatable reads and phantoms are possible.
    ReadUncommitted,
    /// Only committed changes from other transactions are visible.
    #[default]
    ReadCommitted,
    /// A consistent snapshot for the duration of the transaction.
    RepeatableRead,
    /// Transactions appear to execute sequentially.
    Serializable,
}

impl IsolationLevel {
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// A database connection able to execute SQL.
///
/// Implementations must be `Send + Sync`; the association accessors issue
/// several statements concurrently against one shared connection.
pub trait Connection: Send + Sync {
    /// The SQL dialect spoken by this connection.
    fn dialect(&self) -> Dialect;

    /// Execute a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send;

    /// Execute a query and return the first row, if any.
    fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Option<Row>, crate::Error>> + Send {
        async move {
            match self.query(cx, sql, params).await {
                Outcome::Ok(rows) => Outcome::Ok(rows.into_iter().next()),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        }
    }

    /// Execute a statement (INSERT, UPDATE, DELETE, DDL) and return rows affected.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send;

    /// Execute an INSERT and return the id generated for it.
    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<i64, crate::Error>> + Send;

    /// Execute multiple statements sequentially.
    ///
    /// Returns the number of rows affected by each statement and stops at
    /// the first failure.
    fn batch(
        &self,
        cx: &Cx,
        statements: &[(String, Vec<Value>)],
    ) -> impl Future<Output = Outcome<Vec<u64>, crate::Error>> + Send {
        async move {
            let mut results = Vec::with_capacity(statements.len());
            for (sql, params) in statements {
                match self.execute(cx, sql, params).await {
                    Outcome::Ok(n) => results.push(n),
                    Outcome::Err(e) => return Outcome::Err(e),
                    Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                    Outcome::Panicked(p) => return Outcome::Panicked(p),
                }
            }
            Outcome::Ok(results)
        }
    }

    /// Check if the connection is still valid by sending a ping.
    fn ping(&self, cx: &Cx) -> impl Future<Output = Outcome<(), crate::Error>> + Send;

    /// Check if the connection is still valid (alias for ping that returns bool).
    fn is_valid(&self, cx: &Cx) -> impl Future<Output = bool> + Send {
        async {
            match self.ping(cx).await {
                Outcome::Ok(()) => true,
                Outcome::Err(_) | Outcome::Cancelled(_) | Outcome::Panicked(_) => false,
            }
        }
    }

    /// Close the connection gracefully.
    fn close(self, cx: &Cx) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;
    use std::sync::Mutex;

    struct Recorder {
        executed: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl Connection for Recorder {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        fn query(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<Vec<Row>, crate::Error>> + Send {
            async {
                Outcome::Ok(vec![
                    Row::from_pairs([("n", 1_i64)]),
                    Row::from_pairs([("n", 2_i64)]),
                ])
            }
        }

        fn execute(
            &self,
            _cx: &Cx,
            sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<u64, crate::Error>> + Send {
            let sql = sql.to_string();
            async move {
                if self.fail_on == Some(sql.as_str()) {
                    return Outcome::Err(crate::Error::Custom("failed".into()));
                }
                self.executed.lock().unwrap().push(sql);
                Outcome::Ok(1)
            }
        }

        fn insert(
            &self,
            _cx: &Cx,
            _sql: &str,
            _params: &[Value],
        ) -> impl Future<Output = Outcome<i64, crate::Error>> + Send {
            async { Outcome::Ok(1) }
        }

        fn ping(&self, _cx: &Cx) -> impl Future<Output = Outcome<(), crate::Error>> + Send {
            async { Outcome::Ok(()) }
        }

        fn close(self, _cx: &Cx) -> impl Future<Output = Result<()>> + Send {
            async { Ok(()) }
        }
    }

    #[test]
    fn default_query_one_takes_first_row() {
        let rt = RuntimeBuilder::current_thread().build().expect("runtime");
        rt.block_on(async {
            let cx = Cx::for_testing();
            let conn = Recorder {
                executed: Mutex::new(Vec::new()),
                fail_on: None,
            };
            match conn.query_one(&cx, "SELECT n", &[]).await {
                Outcome::Ok(Some(row)) => assert_eq!(row.get_by_name("n"), Some(&Value::BigInt(1))),
                other => panic!("unexpected {other:?}"),
            }
            assert!(conn.is_valid(&cx).await);
        });
    }

    #[test]
    fn default_batch_stops_at_first_failure() {
        let rt = RuntimeBuilder::current_thread().build().expect("runtime");
        rt.block_on(async {
            let cx = Cx::for_testing();
            let conn = Recorder {
                executed: Mutex::new(Vec::new()),
                fail_on: Some("B"),
            };
            let statements = vec![
                ("A".to_string(), vec![]),
                ("B".to_string(), vec![]),
                ("C".to_string(), vec![]),
            ];
            assert!(matches!(conn.batch(&cx, &statements).await, Outcome::Err(_)));
            assert_eq!(*conn.executed.lock().unwrap(), vec!["A".to_string()]);
        });
    }

    #[test]
    fn isolation_level_sql() {
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
        assert_eq!(IsolationLevel::default(), IsolationLevel::ReadCommitted);
    }
}
