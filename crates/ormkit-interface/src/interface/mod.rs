//! The query interface: routes every operation to SQL, runs it and shapes
//! the result.
//!
//! Each routed statement is tagged with a [`QueryType`] before it is sent;
//! the tag decides which driver call runs it and how
//! [`ResultInterpreter`] shapes the output. Dialect differences that are
//! routing decisions (Postgres enum sync before `CREATE TABLE`, SQLite table
//! rebuilds for column changes) live here; statement text comes from the
//! dialect's [`DdlGenerator`] and the `ormkit-query` builders.

mod ddl;
mod dml;

pub use ddl::constraint_names;

use crate::config::InterfaceConfig;
use crate::options::QueryOptions;
use crate::result::{QueryResult, RawResult, ResultInterpreter};
use crate::transaction::{TransactionState, TransactionStateDriver};
use ormkit_core::{
    AttributeValues, ConfigErrorKind, Connection, Cx, DatabaseError, Deferrable, Dialect, Error,
    Instance, IsolationLevel, ModelDef, ModelRegistry, Outcome, QueryType, Result, Row, TableRef,
    Transaction, TransactionOptions, Value, try_outcome,
};
use ormkit_schema::{DdlGenerator, generator_for_dialect};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Leading keywords of statements that produce a result set.
const ROW_KEYWORDS: [&str; 7] = ["SELECT", "PRAGMA", "SHOW", "WITH", "DESCRIBE", "EXPLAIN", "VALUES"];

/// Whether running `sql` yields rows, judged from its text.
pub fn statement_returns_rows(sql: &str) -> bool {
    let upper = sql.trim_start().to_ascii_uppercase();
    ROW_KEYWORDS.iter().any(|k| upper.starts_with(k)) || upper.contains(" RETURNING ")
}

/// Map attribute names to their physical columns.
pub fn field_values(model: &ModelDef, values: &AttributeValues) -> AttributeValues {
    values
        .iter()
        .map(|(name, value)| (model.field_for(name).to_string(), value.clone()))
        .collect()
}

/// Routes schema, data and transaction operations over one connection.
pub struct QueryInterface<C: Connection> {
    conn: C,
    dialect: Dialect,
    generator: Box<dyn DdlGenerator>,
    config: InterfaceConfig,
    registry: Option<Arc<ModelRegistry>>,
    transactions: TransactionStateDriver,
}

impl<C: Connection> std::fmt::Debug for QueryInterface<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryInterface")
            .field("dialect", &self.dialect)
            .field("config", &self.config)
            .field("connection_id", &self.transactions.connection_id())
            .finish_non_exhaustive()
    }
}

impl<C: Connection> QueryInterface<C> {
    pub fn new(conn: C) -> Self {
        let dialect = conn.dialect();
        Self {
            conn,
            dialect,
            generator: generator_for_dialect(dialect),
            config: InterfaceConfig::default(),
            registry: None,
            transactions: TransactionStateDriver::new(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed)),
        }
    }

    /// Interface with explicit settings; fails when the configured dialect
    /// is not the connection's.
    pub fn with_config(conn: C, config: InterfaceConfig) -> Result<Self> {
        config.check_dialect(conn.dialect())?;
        let mut interface = Self::new(conn);
        interface.config = config;
        Ok(interface)
    }

    /// Attach the registry used to find the model behind a table.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ModelRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn into_connection(self) -> C {
        self.conn
    }

    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn generator(&self) -> &dyn DdlGenerator {
        self.generator.as_ref()
    }

    pub const fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    pub fn registry(&self) -> Option<&ModelRegistry> {
        self.registry.as_deref()
    }

    pub fn model(&self, name: &str) -> Option<&ModelDef> {
        self.registry.as_deref().and_then(|r| r.get(name))
    }

    pub fn model_by_table(&self, table: &TableRef) -> Option<&ModelDef> {
        self.registry
            .as_deref()
            .and_then(|r| r.model_by_table(&table.name))
    }

    /// The table with the configured schema applied when it names none.
    pub fn table(&self, table: impl Into<TableRef>) -> TableRef {
        table.into().or_schema(self.config.schema.as_deref())
    }

    pub fn quote_identifier(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    pub fn quote_table(&self, table: impl Into<TableRef>) -> String {
        self.table(table).quoted(self.dialect)
    }

    pub fn escape(&self, value: &Value) -> String {
        self.dialect.escape(value)
    }

    // Routing

    /// Run one tagged statement and shape its result.
    pub(crate) async fn run(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
        options: &QueryOptions,
        model: Option<&ModelDef>,
        instance: Option<&mut Instance>,
    ) -> Outcome<QueryResult, Error> {
        let raw = try_outcome!(self.fetch(cx, sql, params, options, instance.is_some()).await);
        self.interpret(sql, raw, options, model, instance)
    }

    pub(crate) fn interpret(
        &self,
        sql: &str,
        raw: RawResult,
        options: &QueryOptions,
        model: Option<&ModelDef>,
        instance: Option<&mut Instance>,
    ) -> Outcome<QueryResult, Error> {
        match ResultInterpreter.interpret(raw, options, model, instance) {
            Ok(result) => Outcome::Ok(result),
            Err(e) => Outcome::Err(DatabaseError::wrap(e, sql)),
        }
    }

    /// Send a statement through the driver call its tag calls for.
    pub(crate) async fn fetch(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
        options: &QueryOptions,
        bound_instance: bool,
    ) -> Outcome<RawResult, Error> {
        if let Some(tx) = &options.transaction {
            if tx.connection_id() != self.transactions.connection_id() {
                return Outcome::Err(Error::config(
                    ConfigErrorKind::MissingTransaction,
                    format!(
                        "transaction {} belongs to connection {}",
                        tx.id(),
                        tx.connection_id()
                    ),
                ));
            }
        }
        if options.logging.unwrap_or(self.config.logging) {
            tracing::debug!(
                sql = %sql,
                query_type = %options.query_type,
                params = params.len(),
                "Routing statement"
            );
        }

        let query_type = options.query_type;
        let outcome = if query_type.returns_rows() || statement_returns_rows(sql) {
            match self.conn.query(cx, sql, params).await {
                Outcome::Ok(rows) => Outcome::Ok(RawResult::rows(rows)),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        } else if query_type == QueryType::Insert && bound_instance {
            match self.conn.insert(cx, sql, params).await {
                Outcome::Ok(id) => Outcome::Ok(RawResult::inserted(id)),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        } else {
            match self.conn.execute(cx, sql, params).await {
                Outcome::Ok(n) => Outcome::Ok(RawResult::affected(n)),
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        };

        match outcome {
            Outcome::Err(e) => {
                tracing::debug!(sql = %sql, error = %e, "Statement failed");
                Outcome::Err(DatabaseError::wrap(e, sql))
            }
            other => other,
        }
    }

    /// Run an untagged statement without parameters.
    pub(crate) async fn execute_raw(&self, cx: &Cx, sql: &str) -> Outcome<QueryResult, Error> {
        self.run(cx, sql, &[], &QueryOptions::default(), None, None)
            .await
    }

    /// Run untagged statements one after another, stopping at the first
    /// failure.
    pub(crate) async fn execute_all(&self, cx: &Cx, statements: &[String]) -> Outcome<(), Error> {
        for sql in statements {
            try_outcome!(self.execute_raw(cx, sql).await);
        }
        Outcome::Ok(())
    }

    /// Rows of a read-only statement.
    pub(crate) async fn select_rows(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<Vec<Row>, Error> {
        let options = QueryOptions::default().raw().tagged(QueryType::Select);
        let result = try_outcome!(self.run(cx, sql, params, &options, None, None).await);
        Outcome::Ok(result.into_rows())
    }

    // Transactions

    pub fn transaction_state(&self) -> TransactionState {
        self.transactions.state()
    }

    /// A handle for a new top-level transaction on this connection.
    pub fn new_transaction(&self, options: TransactionOptions) -> Transaction {
        self.transactions.transaction(options)
    }

    pub async fn start_transaction(&self, cx: &Cx, transaction: Option<&Transaction>) -> Outcome<(), Error> {
        self.transactions
            .start(cx, &self.conn, self.generator(), transaction)
            .await
    }

    /// Create and start a top-level transaction.
    pub async fn begin(&self, cx: &Cx, options: TransactionOptions) -> Outcome<Transaction, Error> {
        let tx = self.new_transaction(options);
        try_outcome!(self.start_transaction(cx, Some(&tx)).await);
        Outcome::Ok(tx)
    }

    pub async fn set_autocommit(
        &self,
        cx: &Cx,
        transaction: Option<&Transaction>,
        value: bool,
    ) -> Outcome<(), Error> {
        self.transactions
            .set_autocommit(cx, &self.conn, self.generator(), transaction, value)
            .await
    }

    pub async fn set_isolation_level(
        &self,
        cx: &Cx,
        transaction: Option<&Transaction>,
        level: IsolationLevel,
    ) -> Outcome<(), Error> {
        self.transactions
            .set_isolation_level(cx, &self.conn, self.generator(), transaction, level)
            .await
    }

    pub async fn defer_constraints(
        &self,
        cx: &Cx,
        transaction: Option<&Transaction>,
        deferrable: &Deferrable,
    ) -> Outcome<(), Error> {
        self.transactions
            .defer_constraints(cx, &self.conn, self.generator(), transaction, deferrable)
            .await
    }

    pub async fn commit_transaction(&self, cx: &Cx, transaction: Option<&Transaction>) -> Outcome<(), Error> {
        self.transactions
            .commit(cx, &self.conn, self.generator(), transaction)
            .await
    }

    pub async fn rollback_transaction(&self, cx: &Cx, transaction: Option<&Transaction>) -> Outcome<(), Error> {
        self.transactions
            .rollback(cx, &self.conn, self.generator(), transaction)
            .await
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` succeeds and rolls back on every other outcome.
    pub async fn transaction<F, Fut, T>(
        &self,
        cx: &Cx,
        options: TransactionOptions,
        f: F,
    ) -> Outcome<T, Error>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = Outcome<T, Error>>,
    {
        let tx = try_outcome!(self.begin(cx, options).await);
        match f(tx.clone()).await {
            Outcome::Ok(value) => {
                try_outcome!(self.commit_transaction(cx, Some(&tx)).await);
                Outcome::Ok(value)
            }
            failed => {
                if let Outcome::Err(e) = self.rollback_transaction(cx, Some(&tx)).await {
                    tracing::warn!(transaction = %tx.id(), error = %e, "Rollback failed");
                }
                failed
            }
        }
    }
}

#[cfg(test)]
mod tests;
