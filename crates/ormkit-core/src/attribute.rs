//! Attribute (column) definitions and the ordered attribute table of a model.

use crate::types::{DataType, ReferentialAction};
use crate::value::Value;

/// Uniqueness marker of an attribute.
///
/// Attributes sharing the same `Named` value form one composite unique
/// constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unique {
    Flag(bool),
    Named(String),
}

/// Foreign key target of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct References {
    /// Referenced table name
    pub model: String,
    /// Referenced column name
    pub key: String,
}

/// Definition of one model attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDef {
    pub name: String,
    /// Physical column name when it differs from `name`
    pub field: Option<String>,
    pub data_type: DataType,
    pub allow_null: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub unique: Option<Unique>,
    pub default_value: Option<Value>,
    pub references: Option<References>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    /// Installed by the library rather than declared by the user
    pub auto_generated: bool,
}

impl AttributeDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            field: None,
            data_type,
            allow_null: true,
            primary_key: false,
            auto_increment: false,
            unique: None,
            default_value: None,
            references: None,
            on_delete: None,
            on_update: None,
            auto_generated: false,
        }
    }

    /// An empty auto-generated slot, filled in by a later merge.
    pub fn placeholder(name: impl Into<String>) -> Self {
        let mut attr = Self::new(name, DataType::Integer);
        attr.auto_generated = true;
        attr
    }

    /// The surrogate `id` key added to models that declare no primary key.
    pub fn surrogate_id() -> Self {
        let mut attr = Self::new("id", DataType::Integer)
            .primary_key()
            .auto_increment();
        attr.auto_generated = true;
        attr
    }

    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.allow_null = false;
        self
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.allow_null = false;
        self
    }

    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = Some(Unique::Flag(true));
        self
    }

    #[must_use]
    pub fn unique_named(mut self, name: impl Into<String>) -> Self {
        self.unique = Some(Unique::Named(name.into()));
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn references(mut self, model: impl Into<String>, key: impl Into<String>) -> Self {
        self.references = Some(References {
            model: model.into(),
            key: key.into(),
        });
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

    /// The physical column name.
    pub fn field_name(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.name)
    }

    /// Overwrite every property the patch sets; leave the rest.
    pub fn merge(&mut self, patch: &AttributePatch) {
        if let Some(field) = &patch.field {
            self.field = Some(field.clone());
        }
        if let Some(data_type) = &patch.data_type {
            self.data_type = data_type.clone();
        }
        if let Some(allow_null) = patch.allow_null {
            self.allow_null = allow_null;
        }
        if let Some(primary_key) = patch.primary_key {
            self.primary_key = primary_key;
            if primary_key {
                self.allow_null = false;
            }
        }
        if let Some(unique) = &patch.unique {
            self.unique = Some(unique.clone());
        }
        if let Some(default_value) = &patch.default_value {
            self.default_value = Some(default_value.clone());
        }
        if let Some(references) = &patch.references {
            self.references = Some(references.clone());
        }
        if patch.on_delete.is_some() {
            self.on_delete = patch.on_delete;
        }
        if patch.on_update.is_some() {
            self.on_update = patch.on_update;
        }
    }
}

/// A partial attribute description.
///
/// Used for user supplied key attributes and for the metadata computed for
/// join table keys; only the properties that are `Some` are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributePatch {
    pub name: Option<String>,
    pub field: Option<String>,
    pub data_type: Option<DataType>,
    pub allow_null: Option<bool>,
    pub primary_key: Option<bool>,
    pub unique: Option<Unique>,
    pub default_value: Option<Value>,
    pub references: Option<References>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

impl AttributePatch {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    #[must_use]
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    #[must_use]
    pub fn allow_null(mut self, allow_null: bool) -> Self {
        self.allow_null = Some(allow_null);
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

    /// The attribute name this patch declares, falling back to its field.
    pub fn declared_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.field.as_deref())
    }
}

/// Insertion-ordered attribute table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    attributes: Vec<AttributeDef>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AttributeDef> {
        self.attributes.iter_mut().find(|a| a.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Find an attribute by its physical column name.
    pub fn by_field(&self, field: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.field_name() == field)
    }

    /// Insert an attribute, replacing one with the same name in place.
    pub fn insert(&mut self, attribute: AttributeDef) {
        match self.attributes.iter_mut().find(|a| a.name == attribute.name) {
            Some(existing) => *existing = attribute,
            None => self.attributes.push(attribute),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeDef> {
        let index = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(index))
    }

    /// Get the named attribute, inserting an auto-generated placeholder first
    /// when it is missing.
    pub fn get_or_placeholder(&mut self, name: &str) -> &mut AttributeDef {
        let index = match self.attributes.iter().position(|a| a.name == name) {
            Some(index) => index,
            None => {
                self.attributes.push(AttributeDef::placeholder(name));
                self.attributes.len() - 1
            }
        };
        &mut self.attributes[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeDef> {
        self.attributes.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }
}

impl FromIterator<AttributeDef> for AttributeMap {
    fn from_iter<T: IntoIterator<Item = AttributeDef>>(iter: T) -> Self {
        let mut map = AttributeMap::new();
        for attribute in iter {
            map.insert(attribute);
        }
        map
    }
}

impl<'a> IntoIterator for &'a AttributeMap {
    type Item = &'a AttributeDef;
    type IntoIter = std::slice::Iter<'a, AttributeDef>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.iter()
    }
}
