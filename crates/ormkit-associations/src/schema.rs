//! Declaring associations and looking them up afterwards.
//!
//! Models and associations are declared on a [`SchemaBuilder`]. Declaring an
//! association mutates the models involved (it injects key attributes), so
//! everything is finished into an immutable [`Schema`] before any query runs.

use crate::association::{
    AccessorKind, Association, AssociationId, AssociationKind, AssociationOptions, SingleKey,
    check_naming_collision,
};
use crate::belongs_to_many::BelongsToMany;
use crate::pairing::PairingResolver;
use crate::through::JoinModelBuilder;
use ormkit_core::{ConfigErrorKind, Error, ModelDef, ModelRegistry, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Accessor name to association lookup for one source model.
pub type AccessorTable = HashMap<String, (AssociationId, AccessorKind)>;

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    registry: ModelRegistry,
    associations: Vec<Box<dyn Association>>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_registry(registry: ModelRegistry) -> Self {
        Self {
            registry,
            associations: Vec::new(),
        }
    }

    /// Define a model. See [`ModelRegistry::define`].
    pub fn define(&mut self, model: ModelDef) -> Result<&mut Self> {
        self.registry.define(model)?;
        Ok(self)
    }

    pub fn model(&self, name: &str) -> Option<&ModelDef> {
        self.registry.get(name)
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// `source` holds a key pointing at one `target`.
    pub fn belongs_to(
        &mut self,
        source: &str,
        target: &str,
        options: AssociationOptions,
    ) -> Result<AssociationId> {
        let assoc = SingleKey::belongs_to(&mut self.registry, source, target, &options)?;
        check_naming_collision(self.registry.require(source)?, assoc.alias())?;
        self.push(Box::new(assoc))
    }

    /// `source` has at most one `target` pointing back at it.
    pub fn has_one(
        &mut self,
        source: &str,
        target: &str,
        options: AssociationOptions,
    ) -> Result<AssociationId> {
        let assoc = SingleKey::has(&mut self.registry, AssociationKind::HasOne, source, target, &options)?;
        check_naming_collision(self.registry.require(source)?, assoc.alias())?;
        self.push(Box::new(assoc))
    }

    /// `source` has any number of `target` pointing back at it.
    pub fn has_many(
        &mut self,
        source: &str,
        target: &str,
        options: AssociationOptions,
    ) -> Result<AssociationId> {
        let assoc = SingleKey::has(&mut self.registry, AssociationKind::HasMany, source, target, &options)?;
        check_naming_collision(self.registry.require(source)?, assoc.alias())?;
        self.push(Box::new(assoc))
    }

    /// `source` and `target` are linked through rows of a join model.
    ///
    /// A reciprocal declaration over the same join model is paired with this
    /// one before the key attributes are injected.
    #[tracing::instrument(level = "debug", skip(self, options))]
    pub fn belongs_to_many(
        &mut self,
        source: &str,
        target: &str,
        options: AssociationOptions,
    ) -> Result<AssociationId> {
        let mut assoc = BelongsToMany::new(&mut self.registry, source, target, &options)?;
        let id = AssociationId(self.associations.len());

        let partner_id = PairingResolver::find(&self.associations, &assoc);
        let mut partner = partner_id.and_then(|pid| self.associations[pid.0].as_belongs_to_many_mut());
        if let (Some(pid), Some(partner)) = (partner_id, partner.as_deref_mut()) {
            let through = self.registry.require_mut(&assoc.through_model)?;
            PairingResolver::link(&mut assoc, id, partner, pid, through);
        }
        JoinModelBuilder::inject_attributes(&mut assoc, partner, &mut self.registry)?;
        self.push(Box::new(assoc))
    }

    /// Store an association built elsewhere.
    pub fn association(&mut self, association: Box<dyn Association>) -> Result<AssociationId> {
        self.registry.require(association.source())?;
        self.registry.require(association.target())?;
        self.push(association)
    }

    fn push(&mut self, association: Box<dyn Association>) -> Result<AssociationId> {
        for existing in self.associations.iter().filter(|a| a.source() == association.source()) {
            for (_, name) in association.accessors().iter() {
                if existing.accessors().iter().any(|(_, other)| other == name) {
                    return Err(Error::config(
                        ConfigErrorKind::NamingCollision,
                        format!(
                            "accessor '{}' of association '{}' on model {} is already used by association '{}'",
                            name,
                            association.alias(),
                            association.source(),
                            existing.alias()
                        ),
                    ));
                }
            }
        }
        let id = AssociationId(self.associations.len());
        tracing::info!(
            kind = %association.kind(),
            source = %association.source(),
            target = %association.target(),
            alias = %association.alias(),
            "Declared association"
        );
        self.associations.push(association);
        Ok(id)
    }

    /// Freeze the models and associations.
    pub fn finish(self) -> Arc<Schema> {
        let mut accessor_tables: HashMap<String, AccessorTable> = HashMap::new();
        for (index, association) in self.associations.iter().enumerate() {
            let table = accessor_tables.entry(association.source().to_string()).or_default();
            for (kind, name) in association.accessors().iter() {
                table.insert(name.to_string(), (AssociationId(index), kind));
            }
        }
        Arc::new(Schema {
            registry: Arc::new(self.registry),
            associations: self.associations,
            accessor_tables,
        })
    }
}

/// Finished models and associations.
#[derive(Debug)]
pub struct Schema {
    registry: Arc<ModelRegistry>,
    associations: Vec<Box<dyn Association>>,
    accessor_tables: HashMap<String, AccessorTable>,
}

impl Schema {
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Shared handle for a query interface that resolves models by table.
    pub fn registry_arc(&self) -> Arc<ModelRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn model(&self, name: &str) -> Result<&ModelDef> {
        self.registry.require(name)
    }

    pub fn association(&self, id: AssociationId) -> Option<&dyn Association> {
        self.associations.get(id.0).map(AsRef::as_ref)
    }

    pub fn associations(&self) -> impl Iterator<Item = (AssociationId, &dyn Association)> {
        self.associations
            .iter()
            .enumerate()
            .map(|(i, a)| (AssociationId(i), a.as_ref()))
    }

    /// Associations whose accessors are called on `model`.
    pub fn associations_of<'a>(
        &'a self,
        model: &'a str,
    ) -> impl Iterator<Item = (AssociationId, &'a dyn Association)> + 'a {
        self.associations().filter(move |(_, a)| a.source() == model)
    }

    /// The association of `model` reached by `alias`, plural or singular.
    pub fn find<'a>(
        &'a self,
        model: &'a str,
        alias: &str,
    ) -> Option<(AssociationId, &'a dyn Association)> {
        self.associations_of(model).find(|(_, a)| {
            a.alias() == alias || a.name().plural == alias || a.name().singular == alias
        })
    }

    pub fn accessor_table(&self, model: &str) -> Option<&AccessorTable> {
        self.accessor_tables.get(model)
    }

    /// Resolve an accessor name such as `addTags` on `model`.
    pub fn dispatch(&self, model: &str, accessor: &str) -> Option<(AssociationId, AccessorKind)> {
        self.accessor_tables.get(model)?.get(accessor).copied()
    }
}
