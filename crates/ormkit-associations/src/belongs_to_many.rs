//! Many-to-many associations through a join model.

use crate::association::{
    AccessorKind, AccessorNames, Association, AssociationId, AssociationKind, AssociationOptions,
};
use crate::keys::{KeyNaming, resolve_key};
use ormkit_core::inflection::{combine_table_names, singularize};
use ormkit_core::{
    AttributePatch, AttributeValues, ConfigErrorKind, Error, ModelDef, ModelName, ModelRegistry,
    ReferentialAction, Result,
};

/// Which model stores the pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThroughModel {
    /// A model that must already be defined.
    Model(String),
    /// A table name; a bare join model is synthesized for it unless a model
    /// of that name is already defined.
    Table(String),
}

impl ThroughModel {
    pub fn name(&self) -> &str {
        match self {
            ThroughModel::Model(name) | ThroughModel::Table(name) => name,
        }
    }
}

/// Join model settings of a many-to-many association.
#[derive(Debug, Clone, PartialEq)]
pub struct Through {
    pub model: ThroughModel,
    /// Enforce one row per pair when the join model keeps its own key
    pub unique: bool,
    /// Static filter on join rows, also written into inserted rows
    pub scope: Option<AttributeValues>,
}

impl Through {
    pub fn model(name: impl Into<String>) -> Self {
        Self {
            model: ThroughModel::Model(name.into()),
            unique: true,
            scope: None,
        }
    }

    pub fn table(name: impl Into<String>) -> Self {
        Self {
            model: ThroughModel::Table(name.into()),
            unique: true,
            scope: None,
        }
    }

    #[must_use]
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: AttributeValues) -> Self {
        self.scope = Some(scope);
        self
    }
}

impl From<&str> for Through {
    fn from(name: &str) -> Self {
        Through::table(name)
    }
}

const ALL_ACCESSORS: [AccessorKind; 9] = [
    AccessorKind::Get,
    AccessorKind::Set,
    AccessorKind::AddMultiple,
    AccessorKind::Add,
    AccessorKind::Create,
    AccessorKind::Remove,
    AccessorKind::RemoveMultiple,
    AccessorKind::HasSingle,
    AccessorKind::HasAll,
];

/// A many-to-many association.
///
/// `foreign_key` names the join model column pointing at the source and
/// `other_key` the one pointing at the target. Once attributes are
/// injected they are mirrored as `identifier` and `foreign_identifier`.
#[derive(Debug, Clone)]
pub struct BelongsToMany {
    pub(crate) source: String,
    pub(crate) target: String,
    pub(crate) name: ModelName,
    pub(crate) accessors: AccessorNames,
    pub(crate) through_model: String,
    pub(crate) through_table: String,
    pub(crate) through_unique: bool,
    pub(crate) through_scope: Option<AttributeValues>,
    pub(crate) scope: Option<AttributeValues>,
    pub(crate) combined_table_name: String,
    pub(crate) is_self_association: bool,

    pub(crate) foreign_key: String,
    pub(crate) foreign_key_default: bool,
    pub(crate) foreign_key_attribute: AttributePatch,
    pub(crate) other_key: String,
    pub(crate) other_key_default: bool,
    pub(crate) other_key_attribute: AttributePatch,

    pub(crate) identifier: String,
    pub(crate) identifier_field: String,
    pub(crate) foreign_identifier: String,
    pub(crate) foreign_identifier_field: Option<String>,
    pub(crate) primary_key_deleted: bool,
    pub(crate) paired: Option<AssociationId>,

    pub(crate) constraints: bool,
    pub(crate) on_delete: Option<ReferentialAction>,
    pub(crate) on_update: Option<ReferentialAction>,
}

impl BelongsToMany {
    /// Resolve names, keys and the join model.
    ///
    /// A join model named by table is defined here when missing, with no
    /// indexes and without soft deletes.
    pub(crate) fn new(
        registry: &mut ModelRegistry,
        source: &str,
        target: &str,
        options: &AssociationOptions,
    ) -> Result<Self> {
        let through = options.through.clone().ok_or_else(|| {
            Error::config(
                ConfigErrorKind::MissingThrough,
                "belongsToMany must be given a through option, either a string or a model",
            )
        })?;
        let is_self_association = source == target;

        let source_model = registry.require(source)?;
        let target_model = registry.require(target)?;
        let name = match &options.alias {
            Some(alias) => alias.names(),
            None if is_self_association => {
                return Err(Error::config(
                    ConfigErrorKind::MissingAlias,
                    "'as' must be defined for many-to-many self-associations",
                ));
            }
            None => target_model.options.name.clone(),
        };
        let combined_table_name = combine_table_names(
            &source_model.table_name,
            if is_self_association {
                &name.plural
            } else {
                &target_model.table_name
            },
        );

        let foreign = resolve_key(
            source_model,
            options.foreign_key.as_ref(),
            KeyNaming::of(source_model),
        )?;
        let target_singular = if is_self_association {
            singularize(&name.plural)
        } else {
            target_model.options.name.singular.clone()
        };
        let other = resolve_key(
            target_model,
            options.other_key.as_ref(),
            KeyNaming::alias(&target_singular, target_model),
        )?;

        let through_model = match &through.model {
            ThroughModel::Model(model) => registry.require(model)?.name.clone(),
            ThroughModel::Table(table) => {
                if !registry.is_defined(table) {
                    registry.define(
                        ModelDef::new(table.clone())
                            .table_name(table.clone())
                            .paranoid(false),
                    )?;
                    tracing::debug!(through = %table, "Synthesized join model");
                }
                table.clone()
            }
        };
        let through_table = registry.require(&through_model)?.table_name.clone();

        Ok(Self {
            source: source.to_string(),
            target: target.to_string(),
            accessors: AccessorNames::build(&name, &ALL_ACCESSORS, true),
            name,
            through_model,
            through_table,
            through_unique: through.unique,
            through_scope: through.scope,
            scope: options.scope.clone(),
            combined_table_name,
            is_self_association,
            identifier: foreign.name.clone(),
            identifier_field: foreign.name.clone(),
            foreign_identifier: other.name.clone(),
            foreign_identifier_field: None,
            foreign_key: foreign.name,
            foreign_key_default: foreign.is_defaulted,
            foreign_key_attribute: foreign.attribute,
            other_key: other.name,
            other_key_default: other.is_defaulted,
            other_key_attribute: other.attribute,
            primary_key_deleted: false,
            paired: None,
            constraints: options.constraints,
            on_delete: options.on_delete,
            on_update: options.on_update,
        })
    }

    pub fn other_key(&self) -> &str {
        &self.other_key
    }

    /// Join model column holding the source key.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn identifier_field(&self) -> &str {
        &self.identifier_field
    }

    /// Join model column holding the target key.
    pub fn foreign_identifier(&self) -> &str {
        &self.foreign_identifier
    }

    pub fn foreign_identifier_field(&self) -> &str {
        self.foreign_identifier_field
            .as_deref()
            .unwrap_or(&self.foreign_identifier)
    }

    /// Name of the join model.
    pub fn through_model(&self) -> &str {
        &self.through_model
    }

    pub fn through_table(&self) -> &str {
        &self.through_table
    }

    pub fn through_scope(&self) -> Option<&AttributeValues> {
        self.through_scope.as_ref()
    }

    /// Source and target table names combined, smaller one first.
    pub fn combined_table_name(&self) -> &str {
        &self.combined_table_name
    }

    /// The reciprocal association sharing this join model, if any.
    pub fn paired(&self) -> Option<AssociationId> {
        self.paired
    }

    pub fn is_self_association(&self) -> bool {
        self.is_self_association
    }

    /// The join model's surrogate key was dropped for a composite key.
    pub fn primary_key_deleted(&self) -> bool {
        self.primary_key_deleted
    }
}

impl Association for BelongsToMany {
    fn kind(&self) -> AssociationKind {
        AssociationKind::BelongsToMany
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
        &self.name.plural
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

    fn as_belongs_to_many(&self) -> Option<&BelongsToMany> {
        Some(self)
    }

    fn as_belongs_to_many_mut(&mut self) -> Option<&mut BelongsToMany> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormkit_core::{AttributeDef, DataType};

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry.define(ModelDef::new("Post")).unwrap();
        registry.define(ModelDef::new("Tag")).unwrap();
        registry
            .define(ModelDef::new("User").underscored())
            .unwrap();
        registry
    }

    #[test]
    fn through_is_required() {
        let mut registry = registry();
        let err = BelongsToMany::new(&mut registry, "Post", "Tag", &AssociationOptions::new())
            .unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::MissingThrough));
    }

    #[test]
    fn self_association_needs_an_alias() {
        let mut registry = registry();
        let err = BelongsToMany::new(
            &mut registry,
            "User",
            "User",
            &AssociationOptions::through("Friendships"),
        )
        .unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::MissingAlias));
    }

    #[test]
    fn defaults_from_model_names() {
        let mut registry = registry();
        let assoc = BelongsToMany::new(
            &mut registry,
            "Post",
            "Tag",
            &AssociationOptions::through("PostTag"),
        )
        .unwrap();
        assert_eq!(assoc.foreign_key(), "PostId");
        assert_eq!(assoc.other_key(), "TagId");
        assert!(assoc.foreign_key_default && assoc.other_key_default);
        assert_eq!(assoc.alias(), "Tags");
        assert_eq!(assoc.combined_table_name(), "PostsTags");
        assert_eq!(assoc.accessors().get(AccessorKind::AddMultiple), Some("addTags"));
        assert_eq!(assoc.accessors().get(AccessorKind::Create), Some("createTag"));
        assert_eq!(assoc.accessors().get(AccessorKind::HasSingle), Some("hasTag"));

        let through = registry.get("PostTag").unwrap();
        assert_eq!(through.table_name, "PostTag");
        assert!(!through.options.paranoid);
        assert!(through.options.indexes.is_empty());
    }

    #[test]
    fn self_association_uses_the_singular_alias() {
        let mut registry = registry();
        let assoc = BelongsToMany::new(
            &mut registry,
            "User",
            "User",
            &AssociationOptions::through("user_parents").alias("Parents"),
        )
        .unwrap();
        assert_eq!(assoc.foreign_key(), "user_id");
        assert_eq!(assoc.other_key(), "parent_id");
        assert_eq!(assoc.combined_table_name(), "ParentsUsers");
    }

    #[test]
    fn declared_join_model_is_reused() {
        let mut registry = registry();
        registry
            .define(
                ModelDef::new("Tagging")
                    .attribute(AttributeDef::new("status", DataType::String(32))),
            )
            .unwrap();
        let assoc = BelongsToMany::new(
            &mut registry,
            "Post",
            "Tag",
            &AssociationOptions::through(Through::model("Tagging")),
        )
        .unwrap();
        assert_eq!(assoc.through_table(), "Taggings");

        let err = BelongsToMany::new(
            &mut registry,
            "Post",
            "Tag",
            &AssociationOptions::through(Through::model("Missing")),
        )
        .unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnknownModel));
    }
}
