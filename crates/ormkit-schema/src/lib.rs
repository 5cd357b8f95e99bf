//! DDL generation for ormkit.
//!
//! - [`DdlGenerator`] and its SQLite, PostgreSQL and MySQL implementations
//! - [`describe`] normalizes per-dialect table descriptions
//! - [`rebuild`] recreates SQLite tables for column changes
//! - [`enums`] reconciles PostgreSQL enum labels

pub mod ddl;
pub mod describe;
pub mod enums;
pub mod rebuild;
pub mod routine;

pub use ddl::{
    CreateTableOptions, DdlGenerator, EnumPosition, MysqlDdlGenerator, PostgresDdlGenerator,
    SqliteDdlGenerator, generator_for_dialect,
};
pub use describe::{ColumnDescription, TableDescription, apply_foreign_keys, describe_rows};
pub use enums::{missing_labels, parse_enum_labels};
pub use rebuild::{ColumnChange, rebuild_table};
pub use routine::{FunctionDef, FunctionParam, TriggerDef, TriggerEvent, TriggerTiming};
