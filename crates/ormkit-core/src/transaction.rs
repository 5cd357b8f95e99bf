//! Transaction handles.
//!
//! A [`Transaction`] names one logical transaction on one connection. A
//! handle with a parent is a savepoint inside that parent.

use crate::connection::IsolationLevel;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRANSACTION: AtomicU64 = AtomicU64::new(1);

/// Deferral of constraint checks inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferrable {
    /// `SET CONSTRAINTS ... DEFERRED`; empty means all constraints
    SetDeferred(Vec<String>),
    /// `SET CONSTRAINTS ... IMMEDIATE`; empty means all constraints
    SetImmediate(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    pub isolation_level: Option<IsolationLevel>,
    /// Turn autocommit off while the transaction runs
    pub autocommit_off: bool,
    pub deferrable: Option<Deferrable>,
}

/// Handle for a running transaction or savepoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    id: String,
    connection_id: u64,
    parent: Option<String>,
    options: TransactionOptions,
}

impl Transaction {
    /// New top-level transaction bound to a connection.
    pub fn new(connection_id: u64, options: TransactionOptions) -> Self {
        let n = NEXT_TRANSACTION.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("tx-{n}"),
            connection_id,
            parent: None,
            options,
        }
    }

    /// Savepoint nested inside this transaction.
    #[must_use]
    pub fn savepoint(&self) -> Self {
        let n = NEXT_TRANSACTION.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{}-sp-{n}", self.id),
            connection_id: self.connection_id,
            parent: Some(self.id.clone()),
            options: TransactionOptions {
                isolation_level: self.options.isolation_level,
                autocommit_off: self.options.autocommit_off,
                deferrable: None,
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn connection_id(&self) -> u64 {
        self.connection_id
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub const fn is_nested(&self) -> bool {
        self.parent.is_some()
    }

    pub const fn options(&self) -> &TransactionOptions {
        &self.options
    }

    pub const fn isolation_level(&self) -> Option<IsolationLevel> {
        self.options.isolation_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn savepoints_keep_connection_and_parent() {
        let tx = Transaction::new(3, TransactionOptions::default());
        let sp = tx.savepoint();
        assert!(!tx.is_nested());
        assert!(sp.is_nested());
        assert_eq!(sp.parent(), Some(tx.id()));
        assert_eq!(sp.connection_id(), 3);
        assert_ne!(sp.id(), tx.id());
    }
}
