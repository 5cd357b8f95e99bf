//! Runtime model definitions.

use crate::attribute::{AttributeDef, AttributeMap, Unique};
use crate::dialect::Dialect;
use crate::inflection::{pluralize, singularize};
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Attribute name to value bag, used for rows, scopes and through data.
pub type AttributeValues = BTreeMap<String, Value>;

/// Singular and plural display names of a model or association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelName {
    pub singular: String,
    pub plural: String,
}

impl ModelName {
    pub fn new(singular: impl Into<String>, plural: impl Into<String>) -> Self {
        Self {
            singular: singular.into(),
            plural: plural.into(),
        }
    }

    /// Derive both forms from a model name.
    pub fn from_model_name(name: &str) -> Self {
        Self::new(singularize(name), pluralize(name))
    }

    /// Derive both forms from a plural alias.
    pub fn from_plural(plural: &str) -> Self {
        Self::new(singularize(plural), plural)
    }
}

/// Secondary index declared on a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: Option<String>,
    pub fields: Vec<String>,
    pub unique: bool,
}

impl IndexDef {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A unique constraint derived from attribute `unique` markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub name: String,
    pub fields: Vec<String>,
}

/// Possibly schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Fill in a schema when none was given.
    #[must_use]
    pub fn or_schema(mut self, schema: Option<&str>) -> Self {
        if self.schema.is_none() {
            self.schema = schema.map(str::to_string);
        }
        self
    }

    pub fn quoted(&self, dialect: Dialect) -> String {
        dialect.quote_table(self.schema.as_deref(), &self.name)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        TableRef::new(name)
    }
}

impl From<String> for TableRef {
    fn from(name: String) -> Self {
        TableRef::new(name)
    }
}

impl From<&TableRef> for TableRef {
    fn from(table: &TableRef) -> Self {
        table.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
    /// Snake case generated key names instead of camel case
    pub underscored: bool,
    /// Soft delete semantics
    pub paranoid: bool,
    pub name: ModelName,
    pub indexes: Vec<IndexDef>,
    /// Inserts and updates cannot use RETURNING on this table
    pub has_trigger: bool,
    pub default_scope: Option<AttributeValues>,
}

/// Definition of a model: its table and its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDef {
    pub name: String,
    pub table_name: String,
    pub schema: Option<String>,
    pub attributes: AttributeMap,
    pub options: ModelOptions,
    primary_key_attributes: Vec<String>,
    auto_increment_field: Option<String>,
    unique_keys: Vec<UniqueKey>,
}

impl ModelDef {
    /// Start a model definition; the table name is the pluralized model name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table_name: pluralize(&name),
            schema: None,
            attributes: AttributeMap::new(),
            options: ModelOptions {
                underscored: false,
                paranoid: false,
                name: ModelName::from_model_name(&name),
                indexes: Vec::new(),
                has_trigger: false,
                default_scope: None,
            },
            name,
            primary_key_attributes: Vec::new(),
            auto_increment_field: None,
            unique_keys: Vec::new(),
        }
    }

    #[must_use]
    pub fn attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.insert(attribute);
        self
    }

    #[must_use]
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Use the model name as the table name.
    #[must_use]
    pub fn freeze_table_name(mut self) -> Self {
        self.table_name = self.name.clone();
        self
    }

    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn underscored(mut self) -> Self {
        self.options.underscored = true;
        self
    }

    #[must_use]
    pub fn paranoid(mut self, paranoid: bool) -> Self {
        self.options.paranoid = paranoid;
        self
    }

    #[must_use]
    pub fn name(mut self, name: ModelName) -> Self {
        self.options.name = name;
        self
    }

    #[must_use]
    pub fn index(mut self, index: IndexDef) -> Self {
        self.options.indexes.push(index);
        self
    }

    #[must_use]
    pub fn has_trigger(mut self) -> Self {
        self.options.has_trigger = true;
        self
    }

    #[must_use]
    pub fn default_scope(mut self, scope: AttributeValues) -> Self {
        self.options.default_scope = Some(scope);
        self
    }

    /// Recompute the derived key metadata after the attribute table changed.
    pub fn refresh(&mut self) {
        self.primary_key_attributes = self
            .attributes
            .iter()
            .filter(|a| a.primary_key)
            .map(|a| a.name.clone())
            .collect();
        self.auto_increment_field = self
            .attributes
            .iter()
            .find(|a| a.auto_increment)
            .map(|a| a.name.clone());

        let mut unique_keys: Vec<UniqueKey> = Vec::new();
        for attribute in &self.attributes {
            let name = match &attribute.unique {
                Some(Unique::Named(name)) => name.clone(),
                Some(Unique::Flag(true)) => {
                    format!("{}_{}_unique", self.table_name, attribute.field_name())
                }
                Some(Unique::Flag(false)) | None => continue,
            };
            match unique_keys.iter_mut().find(|k| k.name == name) {
                Some(key) => key.fields.push(attribute.name.clone()),
                None => unique_keys.push(UniqueKey {
                    name,
                    fields: vec![attribute.name.clone()],
                }),
            }
        }
        self.unique_keys = unique_keys;
    }

    /// First primary key attribute name.
    pub fn primary_key_attribute(&self) -> Option<&str> {
        self.primary_key_attributes.first().map(String::as_str)
    }

    pub fn primary_key_attributes(&self) -> &[String] {
        &self.primary_key_attributes
    }

    pub fn primary_key_def(&self) -> Option<&AttributeDef> {
        self.primary_key_attribute()
            .and_then(|name| self.attributes.get(name))
    }

    pub fn auto_increment_field(&self) -> Option<&str> {
        self.auto_increment_field.as_deref()
    }

    pub fn unique_keys(&self) -> &[UniqueKey] {
        &self.unique_keys
    }

    /// Attribute sets that identify a row: unique keys then unique indexes.
    pub fn unique_field_sets(&self) -> Vec<Vec<String>> {
        self.unique_keys
            .iter()
            .map(|k| k.fields.clone())
            .chain(
                self.options
                    .indexes
                    .iter()
                    .filter(|i| i.unique)
                    .map(|i| i.fields.clone()),
            )
            .collect()
    }

    /// Physical column of an attribute; unknown names map to themselves.
    pub fn field_for<'a>(&'a self, attribute: &'a str) -> &'a str {
        self.attributes
            .get(attribute)
            .map_or(attribute, AttributeDef::field_name)
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef {
            schema: self.schema.clone(),
            name: self.table_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    #[test]
    fn defaults_from_model_name() {
        let model = ModelDef::new("Person");
        assert_eq!(model.table_name, "People");
        assert_eq!(model.options.name, ModelName::new("Person", "People"));
        assert_eq!(ModelDef::new("Tag").freeze_table_name().table_name, "Tag");
    }

    #[test]
    fn refresh_collects_keys() {
        let mut model = ModelDef::new("Membership")
            .attribute(AttributeDef::new("user_id", DataType::Integer).primary_key())
            .attribute(AttributeDef::new("group_id", DataType::Integer).primary_key())
            .attribute(AttributeDef::new("email", DataType::Text).unique())
            .attribute(AttributeDef::new("a", DataType::Text).unique_named("pair"))
            .attribute(AttributeDef::new("b", DataType::Text).unique_named("pair"));
        model.refresh();
        assert_eq!(model.primary_key_attribute(), Some("user_id"));
        assert_eq!(model.primary_key_attributes().len(), 2);
        assert_eq!(
            model.unique_keys(),
            &[
                UniqueKey {
                    name: "Memberships_email_unique".into(),
                    fields: vec!["email".into()],
                },
                UniqueKey {
                    name: "pair".into(),
                    fields: vec!["a".into(), "b".into()],
                },
            ]
        );
    }

    #[test]
    fn unique_field_sets_include_unique_indexes() {
        let mut model = ModelDef::new("User")
            .attribute(AttributeDef::new("email", DataType::Text).unique())
            .index(IndexDef::new(["first", "last"]).unique())
            .index(IndexDef::new(["age"]));
        model.refresh();
        assert_eq!(
            model.unique_field_sets(),
            vec![
                vec!["email".to_string()],
                vec!["first".to_string(), "last".to_string()]
            ]
        );
    }

    #[test]
    fn table_ref_display_and_quote() {
        let table = TableRef::new("users").or_schema(Some("app"));
        assert_eq!(table.to_string(), "app.users");
        assert_eq!(table.quoted(Dialect::Postgres), "\"app\".\"users\"");
    }
}
