//! Pairing of reciprocal many-to-many associations.
//!
//! `A.belongs_to_many(B, through: T)` followed by
//! `B.belongs_to_many(A, through: T)` describe the same join model from two
//! sides. The second declaration adopts the first one's key names so both
//! read and write the same columns.

use crate::association::{Association, AssociationId};
use crate::belongs_to_many::BelongsToMany;
use ormkit_core::ModelDef;

pub struct PairingResolver;

impl PairingResolver {
    /// Find the declared reciprocal of `candidate`.
    ///
    /// When several associations qualify the first declared one wins.
    pub fn find(
        associations: &[Box<dyn Association>],
        candidate: &BelongsToMany,
    ) -> Option<AssociationId> {
        let mut matches = associations
            .iter()
            .enumerate()
            .filter_map(|(index, assoc)| {
                let other = assoc.as_belongs_to_many()?;
                (other.source == candidate.target
                    && other.target == candidate.source
                    && other.through_model == candidate.through_model)
                    .then_some(AssociationId(index))
            });
        let first = matches.next()?;
        if let Some(ignored) = matches.next() {
            tracing::warn!(
                source = %candidate.source,
                target = %candidate.target,
                through = %candidate.through_model,
                chosen = first.index(),
                ignored = ignored.index(),
                "More than one reciprocal association shares this join model, pairing with the first"
            );
        }
        Some(first)
    }

    /// Link `assoc` (about to be stored as `assoc_id`) with `partner`.
    ///
    /// Defaulted key names on either side are replaced by the other side's
    /// key. A stale attribute the partner injected under its old other key
    /// is removed from the join model.
    pub fn link(
        assoc: &mut BelongsToMany,
        assoc_id: AssociationId,
        partner: &mut BelongsToMany,
        partner_id: AssociationId,
        through: &mut ModelDef,
    ) {
        if assoc.other_key_default {
            assoc.other_key = partner.foreign_key.clone();
        }
        if partner.other_key_default {
            if partner.other_key != assoc.foreign_key {
                through.attributes.remove(&partner.other_key);
                through.refresh();
            }
            partner.other_key = assoc.foreign_key.clone();
            partner.foreign_identifier = assoc.foreign_key.clone();
            partner.foreign_identifier_field = None;
        }
        assoc.paired = Some(partner_id);
        partner.paired = Some(assoc_id);
        tracing::debug!(
            through = %through.name,
            left = %partner.alias(),
            right = %assoc.alias(),
            "Paired many-to-many associations"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::AssociationOptions;
    use crate::keys::KeySpec;
    use ormkit_core::{AttributeDef, DataType, ModelRegistry};

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry.define(ModelDef::new("User")).unwrap();
        registry.define(ModelDef::new("Task")).unwrap();
        registry
    }

    fn declare(
        registry: &mut ModelRegistry,
        source: &str,
        target: &str,
        options: AssociationOptions,
    ) -> BelongsToMany {
        BelongsToMany::new(registry, source, target, &options).unwrap()
    }

    #[test]
    fn finds_the_first_reciprocal() {
        let mut registry = registry();
        let first = declare(&mut registry, "User", "Task", AssociationOptions::through("UserTasks"));
        let second = declare(
            &mut registry,
            "User",
            "Task",
            AssociationOptions::through("UserTasks").alias("Chores"),
        );
        let unrelated = declare(&mut registry, "User", "Task", AssociationOptions::through("Other"));
        let arena: Vec<Box<dyn Association>> =
            vec![Box::new(unrelated), Box::new(first), Box::new(second)];

        let reverse = declare(&mut registry, "Task", "User", AssociationOptions::through("UserTasks"));
        assert_eq!(PairingResolver::find(&arena, &reverse), Some(AssociationId(1)));

        let elsewhere = declare(&mut registry, "Task", "User", AssociationOptions::through("Nope"));
        assert_eq!(PairingResolver::find(&arena, &elsewhere), None);
    }

    #[test]
    fn explicit_key_renames_the_partner() {
        let mut registry = registry();
        let mut first = declare(&mut registry, "User", "Task", AssociationOptions::through("UserTasks"));
        registry
            .require_mut("UserTasks")
            .unwrap()
            .attributes
            .insert(AttributeDef::placeholder("TaskId"));
        let mut second = declare(
            &mut registry,
            "Task",
            "User",
            AssociationOptions::through("UserTasks").foreign_key(KeySpec::from("task_ref")),
        );

        let through = registry.require_mut("UserTasks").unwrap();
        PairingResolver::link(&mut second, AssociationId(1), &mut first, AssociationId(0), through);

        assert_eq!(second.other_key, "UserId");
        assert_eq!(first.other_key, "task_ref");
        assert_eq!(first.foreign_identifier, "task_ref");
        assert!(!through.attributes.contains("TaskId"));
        assert_eq!(first.paired, Some(AssociationId(1)));
        assert_eq!(second.paired, Some(AssociationId(0)));
    }

    #[test]
    fn explicit_other_key_is_kept() {
        let mut registry = registry();
        let mut first = declare(
            &mut registry,
            "User",
            "Task",
            AssociationOptions::through("UserTasks").other_key("assigned_task"),
        );
        let mut second = declare(&mut registry, "Task", "User", AssociationOptions::through("UserTasks"));
        registry
            .require_mut("UserTasks")
            .unwrap()
            .attributes
            .insert(AttributeDef::new("assigned_task", DataType::Integer));

        let through = registry.require_mut("UserTasks").unwrap();
        PairingResolver::link(&mut second, AssociationId(1), &mut first, AssociationId(0), through);

        assert_eq!(first.other_key, "assigned_task");
        assert_eq!(second.foreign_key, "TaskId");
        assert!(through.attributes.contains("assigned_task"));
    }
}
