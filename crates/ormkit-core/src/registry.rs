//! Explicit model registry.
//!
//! Models are defined into a [`ModelRegistry`] that is passed by reference
//! to everything that needs to look one up. There is no global registry.

use crate::attribute::AttributeDef;
use crate::error::{ConfigErrorKind, Error, Result};
use crate::model::ModelDef;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<ModelDef>,
    by_name: HashMap<String, usize>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model.
    ///
    /// A model without a primary key gets an auto-generated `id` key.
    pub fn define(&mut self, mut model: ModelDef) -> Result<&ModelDef> {
        if self.by_name.contains_key(&model.name) {
            return Err(Error::config(
                ConfigErrorKind::DuplicateModel,
                format!("model '{}' is already defined", model.name),
            ));
        }
        if !model.attributes.iter().any(|a| a.primary_key) {
            let mut attributes = crate::attribute::AttributeMap::new();
            attributes.insert(AttributeDef::surrogate_id());
            for attribute in &model.attributes {
                attributes.insert(attribute.clone());
            }
            model.attributes = attributes;
        }
        model.refresh();

        tracing::debug!(
            model = %model.name,
            table = %model.table_name,
            attributes = model.attributes.len(),
            "Defined model"
        );

        let index = self.models.len();
        self.by_name.insert(model.name.clone(), index);
        self.models.push(model);
        Ok(&self.models[index])
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ModelDef> {
        self.by_name.get(name).map(|&i| &self.models[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ModelDef> {
        self.by_name.get(name).map(|&i| &mut self.models[i])
    }

    /// Look a model up, failing with a configuration error when missing.
    pub fn require(&self, name: &str) -> Result<&ModelDef> {
        self.get(name).ok_or_else(|| unknown_model(name))
    }

    pub fn require_mut(&mut self, name: &str) -> Result<&mut ModelDef> {
        match self.by_name.get(name) {
            Some(&i) => Ok(&mut self.models[i]),
            None => Err(unknown_model(name)),
        }
    }

    /// Find the model stored in `table_name`.
    pub fn model_by_table(&self, table_name: &str) -> Option<&ModelDef> {
        self.models.iter().find(|m| m.table_name == table_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelDef> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn unknown_model(name: &str) -> Error {
    Error::config(
        ConfigErrorKind::UnknownModel,
        format!("model '{}' has not been defined", name),
    )
}
