//! Foreign key name and type inference.

use ormkit_core::inflection::{camelize_if, underscored_if};
use ormkit_core::{AttributePatch, ConfigErrorKind, DataType, Error, ModelDef, Result};

/// An explicitly requested key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySpec {
    /// Just the attribute name.
    Name(String),
    /// A full attribute description; its extra properties are merged into
    /// the injected attribute.
    Attribute(AttributePatch),
}

impl From<&str> for KeySpec {
    fn from(name: &str) -> Self {
        KeySpec::Name(name.to_string())
    }
}

impl From<String> for KeySpec {
    fn from(name: String) -> Self {
        KeySpec::Name(name)
    }
}

impl From<AttributePatch> for KeySpec {
    fn from(patch: AttributePatch) -> Self {
        KeySpec::Attribute(patch)
    }
}

/// How a defaulted key name is spelled: `<prefix>_<pk>`, camelized unless
/// the naming model is underscored.
#[derive(Debug, Clone, Copy)]
pub struct KeyNaming<'a> {
    pub prefix: &'a str,
    pub underscored: bool,
}

impl<'a> KeyNaming<'a> {
    /// Prefix with the model's own singular name.
    pub fn of(model: &'a ModelDef) -> Self {
        Self {
            prefix: &model.options.name.singular,
            underscored: model.options.underscored,
        }
    }

    /// Prefix with an alias, spelled by `model`'s convention.
    pub fn alias(alias: &'a str, model: &ModelDef) -> Self {
        Self {
            prefix: alias,
            underscored: model.options.underscored,
        }
    }
}

/// A key resolved against the primary key of the model it points at.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedKey {
    pub name: String,
    /// Type of the referenced primary key
    pub data_type: DataType,
    /// Physical column of the referenced primary key
    pub field: String,
    /// No key was given at all; pairing may still rename it
    pub is_defaulted: bool,
    /// Extra properties of an explicit attribute spec
    pub attribute: AttributePatch,
}

/// Resolve the key referencing `owner`'s primary key.
///
/// An explicit spec is used verbatim. Otherwise the name is derived from
/// `naming` and the owner's primary key attribute.
pub fn resolve_key(
    owner: &ModelDef,
    explicit: Option<&KeySpec>,
    naming: KeyNaming<'_>,
) -> Result<ResolvedKey> {
    let pk = owner.primary_key_def().ok_or_else(|| {
        Error::config(
            ConfigErrorKind::InvalidOption,
            format!("model '{}' has no primary key", owner.name),
        )
    })?;

    let (name, attribute, is_defaulted) = match explicit {
        Some(KeySpec::Attribute(patch)) => {
            let name = patch.declared_name().ok_or_else(|| {
                Error::config(
                    ConfigErrorKind::InvalidOption,
                    "key attribute needs a name or a field",
                )
            })?;
            (name.to_string(), patch.clone(), false)
        }
        Some(KeySpec::Name(name)) => (name.clone(), AttributePatch::default(), false),
        None => {
            let joined = format!(
                "{}_{}",
                underscored_if(naming.prefix, naming.underscored),
                pk.name
            );
            (
                camelize_if(&joined, !naming.underscored),
                AttributePatch::default(),
                true,
            )
        }
    };

    Ok(ResolvedKey {
        name,
        data_type: pk.data_type.clone(),
        field: pk.field_name().to_string(),
        is_defaulted,
        attribute,
    })
}
