//! ormkit - model associations and dialect-aware query routing.
//!
//! ormkit keeps model definitions in an explicit registry, infers the foreign
//! keys of associations, synthesizes many-to-many join models, and routes
//! every schema, data and transaction operation to SQL for PostgreSQL, MySQL
//! or SQLite:
//!
//! - Models and the four association kinds declared on a [`SchemaBuilder`]
//! - Association accessors (`get`, `has`, `set`, `add`, `remove`, `create`)
//!   through an [`AccessorSet`]
//! - DDL, DML and transaction control through a [`QueryInterface`]
//! - A bundled SQLite driver
//!
//! # Quick Start
//!
//! ```ignore
//! use ormkit::prelude::*;
//!
//! let mut builder = SchemaBuilder::new();
//! builder
//!     .define(ModelDef::new("Post").attribute(AttributeDef::new("title", DataType::Text)))?
//!     .define(ModelDef::new("Tag").attribute(AttributeDef::new("name", DataType::Text)))?;
//! let tags = builder.belongs_to_many("Post", "Tag", AssociationOptions::through("PostTags"))?;
//! let schema = builder.finish();
//!
//! let interface = ormkit::open_sqlite(InterfaceConfig::default())?
//!     .with_registry(schema.registry_arc());
//! for model in schema.registry().iter() {
//!     interface.create_model_table(&cx, model, &CreateTableOptions::default()).await;
//! }
//!
//! let accessors = AccessorSet::new(&schema, &interface);
//! accessors.set(&cx, tags, &post, Some(&[Target::from(1)]), &AccessorOptions::new()).await;
//! ```

pub use ormkit_core::{
    AttributeDef, AttributeMap, AttributePatch, AttributeValues, ConfigErrorKind, Connection, Cx,
    DataType, DatabaseErrorKind, Dialect, Error, IndexDef, Instance, IsolationLevel, ModelDef,
    ModelName, ModelRegistry, Outcome, QueryType, ReferentialAction, References, Result, Row,
    TableRef, Transaction, TransactionOptions, Unique, Value, try_outcome, try_result,
};

pub use ormkit_query::{Expr, Join, JoinType, OrderBy, Select, SelectColumn, Where};

pub use ormkit_schema::{CreateTableOptions, DdlGenerator, TableDescription, generator_for_dialect};

pub use ormkit_interface::{
    BulkInsertOptions, DropOptions, InterfaceConfig, QueryInterface, QueryOptions, QueryResult,
    RawSelectOptions, TransactionState, join_all,
};

pub use ormkit_associations::{
    AccessorArgs, AccessorKind, AccessorOptions, AccessorOutput, AccessorSet, Association,
    AssociationId, AssociationKind, AssociationOptions, BelongsToMany, KeySpec, Schema,
    SchemaBuilder, ScopeOption, Target, Through,
};

pub use ormkit_sqlite::{SqliteConfig, SqliteConnection, SqliteConnectionManager};

/// Open a query interface over the SQLite storage `config` names.
///
/// Connections come from a [`SqliteConnectionManager`], so foreign keys are
/// enforced unless the configuration switches them off.
pub fn open_sqlite(config: InterfaceConfig) -> Result<QueryInterface<SqliteConnection>> {
    let storage = config.storage_path();
    let sqlite = if storage == ":memory:" {
        SqliteConfig::memory()
    } else {
        SqliteConfig::file(storage)
    };
    let manager = SqliteConnectionManager::new(sqlite).foreign_keys(config.foreign_keys);
    let conn = manager.get_connection(None)?;
    tracing::info!(storage = %storage, foreign_keys = config.foreign_keys, "Opened SQLite interface");
    QueryInterface::with_config(conn, config)
}

pub mod prelude {
    pub use crate::{
        AccessorOptions,
        AccessorSet,
        AssociationOptions,
        // Definitions
        AttributeDef,
        AttributeValues,
        Connection,
        CreateTableOptions,
        Cx,
        DataType,
        Error,
        Expr,
        Instance,
        InterfaceConfig,
        ModelDef,
        Outcome,
        // Routing
        QueryInterface,
        QueryOptions,
        ReferentialAction,
        Result,
        Row,
        // Associations
        SchemaBuilder,
        Select,
        Target,
        Through,
        Value,
    };
}
