//! Dialect-aware query interface for ormkit.
//!
//! - [`QueryInterface`] routes schema, data and transaction operations to
//!   SQL and runs them over a [`Connection`](ormkit_core::Connection)
//! - [`ResultInterpreter`] shapes raw driver output per
//!   [`QueryType`](ormkit_core::QueryType)
//! - [`TransactionStateDriver`] tracks autocommit, isolation level and the
//!   active transaction of one connection
//! - [`join_all`] completes independent statements concurrently

pub mod config;
pub mod interface;
pub mod join;
pub mod options;
pub mod result;
pub mod transaction;

#[cfg(test)]
mod testing;

pub use config::InterfaceConfig;
pub use interface::{QueryInterface, constraint_names, field_values, statement_returns_rows};
pub use join::{BoxOutcome, join_all};
pub use options::{BulkInsertOptions, DropOptions, QueryOptions, RawSelectOptions};
pub use result::{QueryResult, RawResult, ResultInterpreter};
pub use transaction::{TransactionState, TransactionStateDriver};
