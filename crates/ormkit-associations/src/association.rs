//! The association capability and the single-key association kinds.
//!
//! Every association exposes its source, target, alias, accessor names and
//! foreign key through [`Association`]. The many-to-many variant lives in
//! [`crate::belongs_to_many`]; the three kinds here install a single foreign
//! key attribute on one of the two models.

use crate::belongs_to_many::{BelongsToMany, Through};
use crate::keys::{KeyNaming, KeySpec, resolve_key};
use ormkit_core::inflection::uppercase_first;
use ormkit_core::{
    AttributeValues, ConfigErrorKind, Error, ModelDef, ModelName, ModelRegistry,
    ReferentialAction, References, Result,
};
use std::fmt;

/// Position of an association in a [`Schema`](crate::Schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssociationId(pub(crate) usize);

impl AssociationId {
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    /// The source holds the key pointing at one target row.
    BelongsTo,
    /// One target row holds the key pointing at the source.
    HasOne,
    /// Many target rows hold the key pointing at the source.
    HasMany,
    /// Rows of a join model pair sources with targets.
    BelongsToMany,
}

impl fmt::Display for AssociationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssociationKind::BelongsTo => "BelongsTo",
            AssociationKind::HasOne => "HasOne",
            AssociationKind::HasMany => "HasMany",
            AssociationKind::BelongsToMany => "BelongsToMany",
        })
    }
}

/// The operation an accessor name stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    Get,
    Set,
    Add,
    AddMultiple,
    Create,
    Remove,
    RemoveMultiple,
    HasSingle,
    HasAll,
}

impl AccessorKind {
    /// Prefix of the generated name and whether it takes the plural form.
    const fn template(self) -> (&'static str, bool) {
        match self {
            AccessorKind::Get => ("get", true),
            AccessorKind::Set => ("set", true),
            AccessorKind::AddMultiple => ("add", true),
            AccessorKind::Add => ("add", false),
            AccessorKind::Create => ("create", false),
            AccessorKind::Remove => ("remove", false),
            AccessorKind::RemoveMultiple => ("remove", true),
            AccessorKind::HasSingle => ("has", false),
            AccessorKind::HasAll => ("has", true),
        }
    }
}

/// Accessor names of one association, e.g. `getTags` or `addTag`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessorNames {
    entries: Vec<(AccessorKind, String)>,
}

impl AccessorNames {
    /// Names for `kinds`, using the plural form only where `plural_forms`
    /// allows it.
    pub(crate) fn build(name: &ModelName, kinds: &[AccessorKind], plural_forms: bool) -> Self {
        let plural = uppercase_first(&name.plural);
        let singular = uppercase_first(&name.singular);
        let entries = kinds
            .iter()
            .map(|&kind| {
                let (prefix, wants_plural) = kind.template();
                let noun = if wants_plural && plural_forms {
                    &plural
                } else {
                    &singular
                };
                (kind, format!("{prefix}{noun}"))
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, kind: AccessorKind) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, name)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (AccessorKind, &str)> {
        self.entries.iter().map(|(k, name)| (*k, name.as_str()))
    }
}

/// The alias an association is reached by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alias {
    /// A plural alias; the singular is derived
    Plural(String),
    /// Both forms given explicitly
    Names(ModelName),
}

impl Alias {
    pub(crate) fn names(&self) -> ModelName {
        match self {
            Alias::Plural(plural) => ModelName::from_plural(plural),
            Alias::Names(names) => names.clone(),
        }
    }
}

impl From<&str> for Alias {
    fn from(plural: &str) -> Self {
        Alias::Plural(plural.to_string())
    }
}

impl From<ModelName> for Alias {
    fn from(names: ModelName) -> Self {
        Alias::Names(names)
    }
}

/// Options accepted when declaring an association.
#[derive(Debug, Clone)]
pub struct AssociationOptions {
    pub alias: Option<Alias>,
    pub foreign_key: Option<KeySpec>,
    /// Target-side key of a many-to-many association
    pub other_key: Option<KeySpec>,
    /// Join model of a many-to-many association
    pub through: Option<Through>,
    /// Static filter on the target, also written by `create`
    pub scope: Option<AttributeValues>,
    /// Install REFERENCES and ON DELETE / ON UPDATE actions
    pub constraints: bool,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

impl Default for AssociationOptions {
    fn default() -> Self {
        Self {
            alias: None,
            foreign_key: None,
            other_key: None,
            through: None,
            scope: None,
            constraints: true,
            on_delete: None,
            on_update: None,
        }
    }
}

impl AssociationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Many-to-many options through the given join model.
    pub fn through(through: impl Into<Through>) -> Self {
        Self {
            through: Some(through.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<Alias>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn foreign_key(mut self, key: impl Into<KeySpec>) -> Self {
        self.foreign_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn other_key(mut self, key: impl Into<KeySpec>) -> Self {
        self.other_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: AttributeValues) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub fn constraints(mut self, enabled: bool) -> Self {
        self.constraints = enabled;
        self
    }

    #[must_use]
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    #[must_use]
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

/// Capabilities shared by every association kind.
pub trait Association: fmt::Debug + Send + Sync {
    fn kind(&self) -> AssociationKind;

    /// Name of the model the accessors are called on.
    fn source(&self) -> &str;

    /// Name of the model the accessors return.
    fn target(&self) -> &str;

    /// Singular and plural forms of the alias.
    fn name(&self) -> &ModelName;

    /// The alias itself: the plural form for many, singular otherwise.
    fn alias(&self) -> &str;

    fn accessors(&self) -> &AccessorNames;

    /// Name of the key attribute this association installed.
    fn foreign_key(&self) -> &str;

    fn scope(&self) -> Option<&AttributeValues>;

    fn as_belongs_to_many(&self) -> Option<&BelongsToMany> {
        None
    }

    fn as_belongs_to_many_mut(&mut self) -> Option<&mut BelongsToMany> {
        None
    }

    fn as_single_key(&self) -> Option<&SingleKey> {
        None
    }
}

/// Alias names of a single-key association: the explicit alias, else the
/// target's names.
fn alias_names(options: &AssociationOptions, target: &ModelDef) -> ModelName {
    options
        .alias
        .as_ref()
        .map_or_else(|| target.options.name.clone(), Alias::names)
}

/// An association backed by one foreign key column.
#[derive(Debug, Clone)]
pub struct SingleKey {
    kind: AssociationKind,
    source: String,
    target: String,
    name: ModelName,
    alias: String,
    accessors: AccessorNames,
    foreign_key: String,
    /// Column of `foreign_key` on the model holding it
    foreign_key_field: String,
    /// Attribute of the referenced model the key points at
    referenced_key: String,
    scope: Option<AttributeValues>,
}

impl SingleKey {
    /// The model holding the foreign key column.
    pub fn key_holder(&self) -> &str {
        match self.kind {
            AssociationKind::BelongsTo => &self.source,
            _ => &self.target,
        }
    }

    pub fn foreign_key_field(&self) -> &str {
        &self.foreign_key_field
    }

    /// Primary key attribute the foreign key references.
    pub fn referenced_key(&self) -> &str {
        &self.referenced_key
    }

    /// Declare `source` belongs to `target`: the key lives on the source.
    pub(crate) fn belongs_to(
        registry: &mut ModelRegistry,
        source: &str,
        target: &str,
        options: &AssociationOptions,
    ) -> Result<Self> {
        let target_model = registry.require(target)?;
        let source_model = registry.require(source)?;
        let name = alias_names(options, target_model);
        let key = resolve_key(
            target_model,
            options.foreign_key.as_ref(),
            KeyNaming::alias(&name.singular, source_model),
        )?;
        let referenced_table = target_model.table_name.clone();
        let referenced_key = target_model.primary_key_attribute().unwrap_or("id").to_string();

        let holder = registry.require_mut(source)?;
        let allow_null = key.attribute.allow_null.unwrap_or(true);
        let on_delete = if allow_null {
            ReferentialAction::SetNull
        } else {
            ReferentialAction::NoAction
        };
        let field = install_key(
            holder,
            &key,
            options,
            References {
                model: referenced_table,
                key: key.field.clone(),
            },
            on_delete,
        );

        Ok(Self {
            kind: AssociationKind::BelongsTo,
            source: source.to_string(),
            target: target.to_string(),
            alias: name.singular.clone(),
            accessors: AccessorNames::build(
                &name,
                &[AccessorKind::Get, AccessorKind::Set, AccessorKind::Create],
                false,
            ),
            name,
            foreign_key: key.name,
            foreign_key_field: field,
            referenced_key,
            scope: options.scope.clone(),
        })
    }

    /// Declare `source` has one or many `target`: the key lives on the
    /// target and points at the source's primary key.
    pub(crate) fn has(
        registry: &mut ModelRegistry,
        kind: AssociationKind,
        source: &str,
        target: &str,
        options: &AssociationOptions,
    ) -> Result<Self> {
        let source_model = registry.require(source)?;
        let target_model = registry.require(target)?;
        let name = alias_names(options, target_model);
        let key = resolve_key(source_model, options.foreign_key.as_ref(), KeyNaming::of(source_model))?;
        let referenced_table = source_model.table_name.clone();
        let referenced_key = source_model.primary_key_attribute().unwrap_or("id").to_string();

        let holder = registry.require_mut(target)?;
        let allow_null = key.attribute.allow_null.unwrap_or(true);
        let on_delete = if allow_null {
            ReferentialAction::SetNull
        } else {
            ReferentialAction::Cascade
        };
        let field = install_key(
            holder,
            &key,
            options,
            References {
                model: referenced_table,
                key: key.field.clone(),
            },
            on_delete,
        );

        let (kinds, plural_forms, alias): (&[AccessorKind], bool, String) = match kind {
            AssociationKind::HasMany => (
                &[
                    AccessorKind::Get,
                    AccessorKind::Set,
                    AccessorKind::AddMultiple,
                    AccessorKind::RemoveMultiple,
                    AccessorKind::HasAll,
                ],
                true,
                name.plural.clone(),
            ),
            _ => (
                &[AccessorKind::Get, AccessorKind::Set, AccessorKind::Create],
                false,
                name.singular.clone(),
            ),
        };

        Ok(Self {
            kind,
            source: source.to_string(),
            target: target.to_string(),
            alias,
            accessors: AccessorNames::build(&name, kinds, plural_forms),
            name,
            foreign_key: key.name,
            foreign_key_field: field,
            referenced_key,
            scope: options.scope.clone(),
        })
    }
}

/// Add or extend the key attribute on `holder`; returns its column.
fn install_key(
    holder: &mut ModelDef,
    key: &crate::keys::ResolvedKey,
    options: &AssociationOptions,
    references: References,
    default_on_delete: ReferentialAction,
) -> String {
    let attribute = holder.attributes.get_or_placeholder(&key.name);
    if attribute.auto_generated {
        attribute.data_type = key.data_type.clone();
    }
    attribute.merge(&key.attribute);
    if options.constraints {
        attribute.references = Some(references);
        attribute.on_delete = options
            .on_delete
            .or(attribute.on_delete)
            .or(Some(default_on_delete));
        attribute.on_update = options
            .on_update
            .or(attribute.on_update)
            .or(Some(ReferentialAction::Cascade));
    }
    let field = attribute.field_name().to_string();
    holder.refresh();
    field
}

impl Association for SingleKey {
    fn kind(&self) -> AssociationKind {
        self.kind
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn name(&self) -> &ModelName {
        &self.name
    }

    fn alias(&self) -> &str {
        &self.alias
    }

    fn accessors(&self) -> &AccessorNames {
        &self.accessors
    }

    fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    fn scope(&self) -> Option<&AttributeValues> {
        self.scope.as_ref()
    }

    fn as_single_key(&self) -> Option<&SingleKey> {
        Some(self)
    }
}

/// Reject an alias that shadows one of the source model's attributes.
pub(crate) fn check_naming_collision(source: &ModelDef, alias: &str) -> Result<()> {
    if source.attributes.contains(alias) {
        return Err(Error::config(
            ConfigErrorKind::NamingCollision,
            format!(
                "Naming collision between attribute '{}' and association '{}' on model {}. To remedy this, change either foreignKey or as in your association definition",
                alias, alias, source.name
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormkit_core::{AttributeDef, DataType};

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry.define(ModelDef::new("User")).unwrap();
        registry
            .define(ModelDef::new("Post").attribute(AttributeDef::new("title", DataType::Text)))
            .unwrap();
        registry
    }

    #[test]
    fn accessor_names_follow_the_alias_forms() {
        let names = AccessorNames::build(
            &ModelName::new("tag", "tags"),
            &[AccessorKind::Get, AccessorKind::Add, AccessorKind::HasAll],
            true,
        );
        assert_eq!(names.get(AccessorKind::Get), Some("getTags"));
        assert_eq!(names.get(AccessorKind::Add), Some("addTag"));
        assert_eq!(names.get(AccessorKind::HasAll), Some("hasTags"));
        assert_eq!(names.get(AccessorKind::Remove), None);
    }

    #[test]
    fn belongs_to_installs_key_on_source() {
        let mut registry = registry();
        let assoc = SingleKey::belongs_to(
            &mut registry,
            "Post",
            "User",
            &AssociationOptions::new().alias("Authors"),
        )
        .unwrap();
        assert_eq!(assoc.foreign_key(), "AuthorId");
        assert_eq!(assoc.key_holder(), "Post");
        assert_eq!(assoc.accessors().get(AccessorKind::Get), Some("getAuthor"));

        let key = registry.get("Post").unwrap().attributes.get("AuthorId").unwrap();
        assert_eq!(key.references.as_ref().map(|r| r.model.as_str()), Some("Users"));
        assert_eq!(key.on_delete, Some(ReferentialAction::SetNull));
        assert_eq!(key.on_update, Some(ReferentialAction::Cascade));
    }

    #[test]
    fn has_many_installs_key_on_target() {
        let mut registry = registry();
        let assoc = SingleKey::has(
            &mut registry,
            AssociationKind::HasMany,
            "User",
            "Post",
            &AssociationOptions::new(),
        )
        .unwrap();
        assert_eq!(assoc.foreign_key(), "UserId");
        assert_eq!(assoc.alias(), "Posts");
        assert_eq!(assoc.accessors().get(AccessorKind::Get), Some("getPosts"));
        assert_eq!(assoc.accessors().get(AccessorKind::HasAll), Some("hasPosts"));

        let post = registry.get("Post").unwrap();
        let key = post.attributes.get("UserId").unwrap();
        assert_eq!(key.data_type, DataType::Integer);
        assert!(key.auto_generated);
    }

    #[test]
    fn non_null_has_one_key_cascades() {
        let mut registry = registry();
        SingleKey::has(
            &mut registry,
            AssociationKind::HasOne,
            "User",
            "Post",
            &AssociationOptions::new()
                .foreign_key(ormkit_core::AttributePatch::named("owner_id").allow_null(false)),
        )
        .unwrap();
        let key = registry.get("Post").unwrap().attributes.get("owner_id").unwrap();
        assert!(!key.allow_null);
        assert_eq!(key.on_delete, Some(ReferentialAction::Cascade));
    }

    #[test]
    fn alias_matching_an_attribute_collides() {
        let registry = registry();
        let err = check_naming_collision(registry.get("Post").unwrap(), "title").unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::NamingCollision));
    }
}
