//! In-memory model rows.

use crate::model::{AttributeValues, ModelDef};
use crate::row::Row;
use crate::value::Value;

/// One row of a model held in memory.
///
/// `through` carries join table attributes attached to a target row, both
/// when it was read through an association and when the caller wants them
/// written by `set`/`add`.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    model: String,
    values: AttributeValues,
    through: Option<AttributeValues>,
    is_new_record: bool,
}

impl Instance {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            values: AttributeValues::new(),
            through: None,
            is_new_record: true,
        }
    }

    /// A persisted row built from query output.
    ///
    /// Columns are mapped back to attribute names using the model's fields.
    pub fn from_row(model: &ModelDef, row: &Row) -> Self {
        let mut values = AttributeValues::new();
        for (column, value) in row.iter() {
            let name = model
                .attributes
                .by_field(column)
                .map_or(column, |a| a.name.as_str());
            values.insert(name.to_string(), value.clone());
        }
        Self {
            model: model.name.clone(),
            values,
            through: None,
            is_new_record: false,
        }
    }

    #[must_use]
    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_through(mut self, values: AttributeValues) -> Self {
        self.through = Some(values);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }

    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(attribute.into(), value.into());
    }

    pub fn values(&self) -> &AttributeValues {
        &self.values
    }

    pub fn into_values(self) -> AttributeValues {
        self.values
    }

    pub fn through(&self) -> Option<&AttributeValues> {
        self.through.as_ref()
    }

    pub fn set_through(&mut self, values: Option<AttributeValues>) {
        self.through = values;
    }

    pub fn is_new_record(&self) -> bool {
        self.is_new_record
    }

    pub fn mark_persisted(&mut self) {
        self.is_new_record = false;
    }

    pub fn primary_key<'a>(&'a self, model: &ModelDef) -> Option<&'a Value> {
        model.primary_key_attribute().and_then(|pk| self.get(pk))
    }

    /// Equality conditions that identify this row: every primary key
    /// attribute the instance holds.
    pub fn where_identity(&self, model: &ModelDef) -> AttributeValues {
        model
            .primary_key_attributes()
            .iter()
            .filter_map(|pk| self.get(pk).map(|v| (pk.clone(), v.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeDef;
    use crate::types::DataType;

    fn user_model() -> ModelDef {
        let mut model = ModelDef::new("User")
            .attribute(AttributeDef::new("id", DataType::Integer).primary_key())
            .attribute(AttributeDef::new("firstName", DataType::Text).field("first_name"));
        model.refresh();
        model
    }

    #[test]
    fn from_row_maps_fields_to_attributes() {
        let model = user_model();
        let row = Row::from_pairs([
            ("id", Value::BigInt(4)),
            ("first_name", Value::Text("Ada".into())),
        ]);
        let user = Instance::from_row(&model, &row);
        assert!(!user.is_new_record());
        assert_eq!(user.get("firstName"), Some(&Value::Text("Ada".into())));
        assert_eq!(user.primary_key(&model), Some(&Value::BigInt(4)));
    }

    #[test]
    fn where_identity_uses_primary_keys() {
        let model = user_model();
        let user = Instance::new("User").with("id", 9).with("firstName", "Bo");
        let identity = user.where_identity(&model);
        assert_eq!(identity.len(), 1);
        assert_eq!(identity["id"], Value::Int(9));
    }
}
