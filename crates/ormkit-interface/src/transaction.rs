//! Per connection transaction state.
//!
//! Every transition issues the dialect statement first and only then
//! updates the tracked state, so a failed statement leaves the state as it
//! was. Handles are checked before any SQL is sent.

use ormkit_core::{
    ConfigErrorKind, Connection, Cx, DatabaseError, Deferrable, Error, IsolationLevel, Outcome,
    Result, Transaction, TransactionError, TransactionErrorKind, try_outcome, try_result,
};
use ormkit_schema::DdlGenerator;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// What the connection is currently doing transaction wise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionState {
    pub autocommit: bool,
    pub isolation_level: Option<IsolationLevel>,
    /// Running transaction followed by its open savepoints
    pub active: Vec<String>,
}

impl Default for TransactionState {
    fn default() -> Self {
        Self {
            autocommit: true,
            isolation_level: None,
            active: Vec::new(),
        }
    }
}

impl TransactionState {
    pub fn in_transaction(&self) -> bool {
        !self.active.is_empty()
    }
}

/// Issues transaction statements for one connection and tracks the result.
#[derive(Debug)]
pub struct TransactionStateDriver {
    connection_id: u64,
    state: Mutex<TransactionState>,
}

impl TransactionStateDriver {
    pub fn new(connection_id: u64) -> Self {
        Self {
            connection_id,
            state: Mutex::new(TransactionState::default()),
        }
    }

    pub const fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// A new top-level handle bound to this connection.
    pub fn transaction(&self, options: ormkit_core::TransactionOptions) -> Transaction {
        Transaction::new(self.connection_id, options)
    }

    pub fn state(&self) -> TransactionState {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, TransactionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn require<'t>(&self, transaction: Option<&'t Transaction>, operation: &str) -> Result<&'t Transaction> {
        let Some(transaction) = transaction else {
            return Err(Error::config(
                ConfigErrorKind::MissingTransaction,
                format!("Unable to {operation} without a transaction handle"),
            ));
        };
        self.check_connection(transaction, operation)?;
        Ok(transaction)
    }

    fn check_connection(&self, transaction: &Transaction, operation: &str) -> Result<()> {
        if transaction.connection_id() == self.connection_id {
            Ok(())
        } else {
            Err(Error::config(
                ConfigErrorKind::MissingTransaction,
                format!(
                    "Unable to {operation}: transaction {} belongs to connection {}, not {}",
                    transaction.id(),
                    transaction.connection_id(),
                    self.connection_id
                ),
            ))
        }
    }

    fn require_active(&self, transaction: &Transaction) -> Result<()> {
        if self.lock().active.iter().any(|id| id == transaction.id()) {
            Ok(())
        } else {
            Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::NotActive,
                message: format!("transaction {} is not running", transaction.id()),
            }))
        }
    }

    async fn issue<C: Connection>(cx: &Cx, conn: &C, sql: &str) -> Outcome<(), Error> {
        tracing::debug!(sql = %sql, "Issuing transaction statement");
        match conn.execute(cx, sql, &[]).await {
            Outcome::Ok(_) => Outcome::Ok(()),
            Outcome::Err(e) => Outcome::Err(DatabaseError::wrap(e, sql)),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Begin `transaction`, or open a savepoint when it is nested.
    #[tracing::instrument(level = "debug", skip_all, fields(transaction = ?transaction.map(Transaction::id)))]
    pub async fn start<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        generator: &dyn DdlGenerator,
        transaction: Option<&Transaction>,
    ) -> Outcome<(), Error> {
        let tx = try_result!(self.require(transaction, "start a transaction"));
        {
            let state = self.lock();
            if !tx.is_nested() && state.in_transaction() {
                return Outcome::Err(Error::Transaction(TransactionError {
                    kind: TransactionErrorKind::AlreadyActive,
                    message: format!(
                        "connection {} is already running {}",
                        self.connection_id, state.active[0]
                    ),
                }));
            }
        }
        if let Some(parent) = tx.parent() {
            let parent_active = self.lock().active.iter().any(|id| id == parent);
            if !parent_active {
                return Outcome::Err(Error::Transaction(TransactionError {
                    kind: TransactionErrorKind::NotActive,
                    message: format!("parent transaction {parent} is not running"),
                }));
            }
        }

        let options = tx.options();
        let isolation = options
            .isolation_level
            .and_then(|level| generator.set_isolation_level(tx, level));
        let after_begin = generator.isolation_after_begin();

        if let (Some(sql), false) = (&isolation, after_begin) {
            try_outcome!(Self::issue(cx, conn, sql).await);
        }
        try_outcome!(Self::issue(cx, conn, &generator.start_transaction(tx)).await);
        if let (Some(sql), true) = (&isolation, after_begin) {
            try_outcome!(Self::issue(cx, conn, sql).await);
        }
        if options.autocommit_off {
            if let Some(sql) = generator.set_autocommit(tx, false) {
                try_outcome!(Self::issue(cx, conn, &sql).await);
            }
        }
        if let Some(sql) = options
            .deferrable
            .as_ref()
            .and_then(|d| generator.defer_constraints(d))
        {
            try_outcome!(Self::issue(cx, conn, &sql).await);
        }

        let mut state = self.lock();
        state.active.push(tx.id().to_string());
        if !tx.is_nested() {
            state.autocommit = !options.autocommit_off;
            if isolation.is_some() {
                state.isolation_level = options.isolation_level;
            }
        }
        tracing::info!(transaction = %tx.id(), nested = tx.is_nested(), "Started transaction");
        Outcome::Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(value = value))]
    pub async fn set_autocommit<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        generator: &dyn DdlGenerator,
        transaction: Option<&Transaction>,
        value: bool,
    ) -> Outcome<(), Error> {
        let tx = try_result!(self.require(transaction, "set autocommit"));
        let Some(sql) = generator.set_autocommit(tx, value) else {
            return Outcome::Ok(());
        };
        try_outcome!(Self::issue(cx, conn, &sql).await);
        self.lock().autocommit = value;
        Outcome::Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(level = ?level))]
    pub async fn set_isolation_level<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        generator: &dyn DdlGenerator,
        transaction: Option<&Transaction>,
        level: IsolationLevel,
    ) -> Outcome<(), Error> {
        let tx = try_result!(self.require(transaction, "set the isolation level"));
        if tx.is_nested() {
            return Outcome::Ok(());
        }
        let Some(sql) = generator.set_isolation_level(tx, level) else {
            return Outcome::Ok(());
        };
        try_outcome!(Self::issue(cx, conn, &sql).await);
        self.lock().isolation_level = Some(level);
        Outcome::Ok(())
    }

    /// Defer or restore constraint checking.
    ///
    /// A missing handle is accepted; a handle from another connection is
    /// not.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn defer_constraints<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        generator: &dyn DdlGenerator,
        transaction: Option<&Transaction>,
        deferrable: &Deferrable,
    ) -> Outcome<(), Error> {
        if let Some(tx) = transaction {
            try_result!(self.check_connection(tx, "defer constraints"));
        }
        match generator.defer_constraints(deferrable) {
            Some(sql) => Self::issue(cx, conn, &sql).await,
            None => Outcome::Ok(()),
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(transaction = ?transaction.map(Transaction::id)))]
    pub async fn commit<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        generator: &dyn DdlGenerator,
        transaction: Option<&Transaction>,
    ) -> Outcome<(), Error> {
        let tx = try_result!(self.require(transaction, "commit a transaction"));
        try_result!(self.require_active(tx));
        if let Some(sql) = generator.commit_transaction(tx) {
            try_outcome!(Self::issue(cx, conn, &sql).await);
        }
        self.release(tx);
        tracing::info!(transaction = %tx.id(), "Committed transaction");
        Outcome::Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(transaction = ?transaction.map(Transaction::id)))]
    pub async fn rollback<C: Connection>(
        &self,
        cx: &Cx,
        conn: &C,
        generator: &dyn DdlGenerator,
        transaction: Option<&Transaction>,
    ) -> Outcome<(), Error> {
        let tx = try_result!(self.require(transaction, "rollback a transaction"));
        try_result!(self.require_active(tx));
        try_outcome!(Self::issue(cx, conn, &generator.rollback_transaction(tx)).await);
        self.release(tx);
        tracing::info!(transaction = %tx.id(), "Rolled back transaction");
        Outcome::Ok(())
    }

    /// Drop `transaction` and everything opened after it.
    fn release(&self, transaction: &Transaction) {
        let mut state = self.lock();
        if transaction.is_nested() {
            if let Some(position) = state.active.iter().position(|id| id == transaction.id()) {
                state.active.truncate(position);
            }
        } else {
            *state = TransactionState::default();
        }
    }
}
