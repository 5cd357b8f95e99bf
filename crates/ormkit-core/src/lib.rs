//! Core types and traits for ormkit.
//!
//! - [`Value`] and [`Row`] for data moving in and out of drivers
//! - [`Connection`] trait, the seam every execution driver implements
//! - [`ModelDef`], [`AttributeDef`] and the explicit [`ModelRegistry`]
//! - [`Dialect`] quoting and [`QueryType`] intent tags
//! - `Outcome` and `Cx` re-exported from asupersync

pub use asupersync::{Cx, Outcome};

/// Unwrap `Outcome::Ok`, returning every other variant from the enclosing
/// async function.
#[macro_export]
macro_rules! try_outcome {
    ($expr:expr) => {
        match $expr {
            $crate::Outcome::Ok(value) => value,
            $crate::Outcome::Err(e) => return $crate::Outcome::Err(e),
            $crate::Outcome::Cancelled(r) => return $crate::Outcome::Cancelled(r),
            $crate::Outcome::Panicked(p) => return $crate::Outcome::Panicked(p),
        }
    };
}

/// Unwrap a `Result` inside a function returning `Outcome`.
#[macro_export]
macro_rules! try_result {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(e) => return $crate::Outcome::Err(e.into()),
        }
    };
}

pub mod attribute;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod inflection;
pub mod instance;
pub mod model;
pub mod query_type;
pub mod registry;
pub mod row;
pub mod transaction;
pub mod types;
pub mod value;

pub use attribute::{AttributeDef, AttributeMap, AttributePatch, References, Unique};
pub use connection::{Connection, IsolationLevel};
pub use dialect::Dialect;
pub use error::{
    ConfigError, ConfigErrorKind, ConnectionError, ConnectionErrorKind, DatabaseError,
    DatabaseErrorKind, Error, Result, SchemaError, SchemaErrorKind, TransactionError,
    TransactionErrorKind, ValidationError, ValidationErrorKind,
};
pub use instance::Instance;
pub use model::{AttributeValues, IndexDef, ModelDef, ModelName, TableRef, UniqueKey};
pub use query_type::QueryType;
pub use registry::ModelRegistry;
pub use row::{ColumnInfo, Row};
pub use transaction::{Deferrable, Transaction, TransactionOptions};
pub use types::{DataType, ReferentialAction};
pub use value::Value;
