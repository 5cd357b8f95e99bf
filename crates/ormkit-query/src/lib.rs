//! Query building for ormkit.
//!
//! `ormkit-query` turns expressions and attribute bags into dialect-specific
//! SQL plus bound parameters. Nothing here touches a connection.

pub mod builder;
pub mod clause;
pub mod expr;
pub mod join;
pub mod select;

pub use builder::{DeleteBuilder, IncrementBuilder, InsertBuilder, UpdateBuilder, UpsertBuilder};
pub use clause::{OrderBy, OrderDirection, Where};
pub use expr::{BinaryOp, Expr};
pub use join::{Join, JoinType};
pub use select::{Select, SelectColumn};
