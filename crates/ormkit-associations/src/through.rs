//! Key attribute injection into many-to-many join models.

use crate::association::check_naming_collision;
use crate::belongs_to_many::BelongsToMany;
use ormkit_core::{
    AttributePatch, DataType, ModelRegistry, ReferentialAction, References, Result, Unique,
};

/// Referenced table, key column and key type of one side.
struct Side {
    table: String,
    field: String,
    data_type: DataType,
}

impl Side {
    fn of(registry: &ModelRegistry, model: &str) -> Result<Self> {
        let model = registry.require(model)?;
        let (field, data_type) = model.primary_key_def().map_or_else(
            || ("id".to_string(), DataType::Integer),
            |pk| (pk.field_name().to_string(), pk.data_type.clone()),
        );
        Ok(Self {
            table: model.table_name.clone(),
            field,
            data_type,
        })
    }
}

/// Installs the two key attributes of a many-to-many association into its
/// join model.
pub struct JoinModelBuilder;

impl JoinModelBuilder {
    /// Add or complete the identifier and foreign identifier attributes.
    ///
    /// A surrogate primary key the join model got by default is dropped and
    /// the two keys become a composite primary key. A join model that keeps
    /// its own key instead gets a named unique constraint over both keys
    /// when the through options ask for uniqueness.
    pub fn inject_attributes(
        assoc: &mut BelongsToMany,
        partner: Option<&mut BelongsToMany>,
        registry: &mut ModelRegistry,
    ) -> Result<()> {
        assoc.identifier = assoc.foreign_key.clone();
        assoc.foreign_identifier = assoc.other_key.clone();

        let source = Side::of(registry, &assoc.source)?;
        let target = Side::of(registry, &assoc.target)?;
        let through = registry.require_mut(&assoc.through_model)?;

        let surrogates: Vec<String> = through
            .attributes
            .iter()
            .filter(|a| a.primary_key && a.auto_generated && a.references.is_none())
            .map(|a| a.name.clone())
            .collect();
        for name in &surrogates {
            through.attributes.remove(name);
            assoc.primary_key_deleted = true;
        }
        // A reciprocal declaration finds the composite key already in place.
        let composite = assoc.primary_key_deleted
            || (through.attributes.iter().any(|a| a.primary_key)
                && through
                    .attributes
                    .iter()
                    .filter(|a| a.primary_key)
                    .all(|a| a.auto_generated && a.references.is_some()));

        let mut source_patch = assoc.foreign_key_attribute.clone();
        let mut target_patch = assoc.other_key_attribute.clone();
        source_patch.data_type.get_or_insert(source.data_type);
        target_patch.data_type.get_or_insert(target.data_type);

        if composite {
            source_patch.primary_key = Some(true);
            target_patch.primary_key = Some(true);
        } else if assoc.through_unique {
            let name = format!(
                "{}_{}_{}_unique",
                through.table_name, assoc.identifier, assoc.foreign_identifier
            );
            source_patch.unique = Some(Unique::Named(name.clone()));
            target_patch.unique = Some(Unique::Named(name));
        }

        let existing_source = through.attributes.get_or_placeholder(&assoc.identifier).clone();
        let existing_target = through
            .attributes
            .get_or_placeholder(&assoc.foreign_identifier)
            .clone();

        if assoc.constraints {
            source_patch.references = Some(References {
                model: source.table,
                key: source.field,
            });
            source_patch.on_delete = assoc.on_delete.or(existing_source.on_delete).or(Some(ReferentialAction::Cascade));
            source_patch.on_update = assoc.on_update.or(existing_source.on_update).or(Some(ReferentialAction::Cascade));

            target_patch.references = Some(References {
                model: target.table,
                key: target.field,
            });
            // The target side may carry actions from the reciprocal declaration.
            target_patch.on_delete = existing_target.on_delete.or(assoc.on_delete).or(Some(ReferentialAction::Cascade));
            target_patch.on_update = existing_target.on_update.or(assoc.on_update).or(Some(ReferentialAction::Cascade));
        }

        assoc.identifier_field = merge_into(through, &assoc.identifier, &source_patch);
        let foreign_field = merge_into(through, &assoc.foreign_identifier, &target_patch);
        assoc.foreign_identifier_field = Some(foreign_field);

        if let Some(partner) = partner {
            if partner.foreign_identifier_field.is_none() {
                let field = through
                    .attributes
                    .get(&partner.foreign_identifier)
                    .map_or_else(|| partner.foreign_identifier.clone(), |a| a.field_name().to_string());
                partner.foreign_identifier_field = Some(field);
            }
        }

        through.refresh();
        tracing::debug!(
            through = %through.name,
            identifier = %assoc.identifier,
            foreign_identifier = %assoc.foreign_identifier,
            composite,
            "Injected join model keys"
        );

        check_naming_collision(registry.require(&assoc.source)?, &assoc.name.plural)
    }
}

fn merge_into(through: &mut ormkit_core::ModelDef, name: &str, patch: &AttributePatch) -> String {
    let attribute = through.attributes.get_or_placeholder(name);
    attribute.merge(patch);
    attribute.field_name().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::AssociationOptions;
    use crate::belongs_to_many::Through;
    use crate::pairing::PairingResolver;
    use crate::AssociationId;
    use ormkit_core::{AttributeDef, ConfigErrorKind, ModelDef};

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry.define(ModelDef::new("Post")).unwrap();
        registry
            .define(
                ModelDef::new("Tag")
                    .attribute(AttributeDef::new("code", DataType::String(16)).primary_key()),
            )
            .unwrap();
        registry
    }

    #[test]
    fn synthesized_join_model_gets_composite_key() {
        let mut registry = registry();
        let mut assoc =
            BelongsToMany::new(&mut registry, "Post", "Tag", &AssociationOptions::through("post_tags"))
                .unwrap();
        JoinModelBuilder::inject_attributes(&mut assoc, None, &mut registry).unwrap();

        let through = registry.get("post_tags").unwrap();
        assert!(!through.attributes.contains("id"));
        assert!(assoc.primary_key_deleted());
        assert_eq!(through.primary_key_attributes(), ["PostId", "TagCode"]);

        let post_id = through.attributes.get("PostId").unwrap();
        assert_eq!(post_id.data_type, DataType::Integer);
        assert_eq!(post_id.on_delete, Some(ReferentialAction::Cascade));
        assert_eq!(
            post_id.references,
            Some(References {
                model: "Posts".into(),
                key: "id".into()
            })
        );
        let tag_code = through.attributes.get("TagCode").unwrap();
        assert_eq!(tag_code.data_type, DataType::String(16));
        assert!(tag_code.unique.is_none());
        assert_eq!(assoc.foreign_identifier_field(), "TagCode");
    }

    #[test]
    fn declared_join_model_keeps_its_key_and_gets_a_named_unique() {
        let mut registry = registry();
        registry
            .define(
                ModelDef::new("Tagging")
                    .attribute(AttributeDef::new("id", DataType::BigInt).primary_key().auto_increment()),
            )
            .unwrap();
        let mut assoc = BelongsToMany::new(
            &mut registry,
            "Post",
            "Tag",
            &AssociationOptions::through(Through::model("Tagging")),
        )
        .unwrap();
        JoinModelBuilder::inject_attributes(&mut assoc, None, &mut registry).unwrap();

        let through = registry.get("Tagging").unwrap();
        assert!(!assoc.primary_key_deleted());
        assert_eq!(through.primary_key_attributes(), ["id"]);
        let expected = Some(Unique::Named("Taggings_PostId_TagCode_unique".into()));
        assert_eq!(through.attributes.get("PostId").unwrap().unique, expected);
        assert_eq!(through.attributes.get("TagCode").unwrap().unique, expected);
        assert!(!through.attributes.get("PostId").unwrap().primary_key);
    }

    #[test]
    fn uniqueness_can_be_disabled() {
        let mut registry = registry();
        registry
            .define(ModelDef::new("Tagging").attribute(AttributeDef::new("id", DataType::BigInt).primary_key()))
            .unwrap();
        let mut assoc = BelongsToMany::new(
            &mut registry,
            "Post",
            "Tag",
            &AssociationOptions::through(Through::model("Tagging").unique(false)),
        )
        .unwrap();
        JoinModelBuilder::inject_attributes(&mut assoc, None, &mut registry).unwrap();
        assert!(registry.get("Tagging").unwrap().attributes.get("PostId").unwrap().unique.is_none());
    }

    #[test]
    fn reciprocal_keeps_the_composite_key_and_earlier_actions() {
        let mut registry = registry();
        let mut first = BelongsToMany::new(
            &mut registry,
            "Post",
            "Tag",
            &AssociationOptions::through("post_tags").on_delete(ReferentialAction::Restrict),
        )
        .unwrap();
        JoinModelBuilder::inject_attributes(&mut first, None, &mut registry).unwrap();

        let mut second =
            BelongsToMany::new(&mut registry, "Tag", "Post", &AssociationOptions::through("post_tags"))
                .unwrap();
        let through = registry.require_mut("post_tags").unwrap();
        PairingResolver::link(&mut second, AssociationId(1), &mut first, AssociationId(0), through);
        JoinModelBuilder::inject_attributes(&mut second, Some(&mut first), &mut registry).unwrap();

        let through = registry.get("post_tags").unwrap();
        assert_eq!(through.attributes.len(), 2);
        assert_eq!(through.primary_key_attributes().len(), 2);
        let post_id = through.attributes.get("PostId").unwrap();
        assert_eq!(post_id.on_delete, Some(ReferentialAction::Restrict));
        assert!(post_id.unique.is_none());
        assert_eq!(second.identifier(), "TagCode");
        assert_eq!(second.foreign_identifier(), "PostId");
    }

    #[test]
    fn alias_shadowing_an_attribute_is_rejected() {
        let mut registry = registry();
        registry
            .require_mut("Post")
            .unwrap()
            .attributes
            .insert(AttributeDef::new("Tags", DataType::Text));
        let mut assoc =
            BelongsToMany::new(&mut registry, "Post", "Tag", &AssociationOptions::through("post_tags"))
                .unwrap();
        let err = JoinModelBuilder::inject_attributes(&mut assoc, None, &mut registry).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::NamingCollision));
    }
}
