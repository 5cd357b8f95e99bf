//! Model associations for ormkit.
//!
//! - [`SchemaBuilder`] declares models and the four association kinds
//!   (belongs to, has one, has many, belongs to many) and injects their key
//!   attributes
//! - [`resolve_key`] infers foreign key names and types
//! - [`PairingResolver`] links reciprocal many-to-many declarations so both
//!   sides share one join model and its columns
//! - [`JoinModelBuilder`] installs the join model's key attributes and
//!   constraints
//! - [`AccessorSet`] runs the accessors (`get`, `has`, `set`, `add`,
//!   `remove`, `create`) over a [`QueryInterface`](ormkit_interface::QueryInterface)
//!
//! ```rust,ignore
//! use ormkit_associations::{AccessorOptions, AccessorSet, AssociationOptions, SchemaBuilder};
//!
//! let mut builder = SchemaBuilder::new();
//! builder.define(ModelDef::new("Post"))?.define(ModelDef::new("Tag"))?;
//! let tags = builder.belongs_to_many("Post", "Tag", AssociationOptions::through("PostTags"))?;
//! let schema = builder.finish();
//!
//! let accessors = AccessorSet::new(&schema, &interface);
//! accessors.add(&cx, tags, &post, Some(&[tag.into()]), &AccessorOptions::new()).await;
//! ```

pub mod accessors;
pub mod association;
pub mod belongs_to_many;
pub mod keys;
pub mod pairing;
pub mod schema;
pub mod through;

pub use accessors::{
    AccessorArgs, AccessorOptions, AccessorOutput, AccessorSet, ScopeOption, Target,
};
pub use association::{
    AccessorKind, AccessorNames, Alias, Association, AssociationId, AssociationKind,
    AssociationOptions, SingleKey,
};
pub use belongs_to_many::{BelongsToMany, Through, ThroughModel};
pub use keys::{KeyNaming, KeySpec, ResolvedKey, resolve_key};
pub use pairing::PairingResolver;
pub use schema::{AccessorTable, Schema, SchemaBuilder};
pub use through::JoinModelBuilder;
