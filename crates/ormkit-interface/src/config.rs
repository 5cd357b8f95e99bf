//! Query interface configuration.

use ormkit_core::{ConfigErrorKind, Dialect, Error, Result};
use serde::{Deserialize, Serialize};

/// Settings shared by every statement a [`QueryInterface`](crate::QueryInterface)
/// routes.
///
/// ```
/// use ormkit_interface::InterfaceConfig;
///
/// let config = InterfaceConfig::from_json_str(r#"{"dialect": "sqlite", "storage": ":memory:"}"#)
///     .unwrap();
/// assert!(config.foreign_keys);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    /// Expected dialect; checked against the connection when set
    pub dialect: Option<Dialect>,
    /// Schema applied to tables given without one
    pub schema: Option<String>,
    /// SQLite storage path, `:memory:` when absent
    pub storage: Option<String>,
    /// Enforce foreign keys on SQLite connections
    pub foreign_keys: bool,
    /// Database name used when listing foreign keys
    pub database: Option<String>,
    /// Emit a debug event per routed statement
    pub logging: bool,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            dialect: None,
            schema: None,
            storage: None,
            foreign_keys: true,
            database: None,
            logging: true,
        }
    }
}

impl InterfaceConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = Some(storage.into());
        self
    }

    #[must_use]
    pub const fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    #[must_use]
    pub const fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Storage path, with the in-memory default applied.
    pub fn storage_path(&self) -> &str {
        self.storage.as_deref().unwrap_or(":memory:")
    }

    /// Reject a configuration written for another dialect.
    pub fn check_dialect(&self, actual: Dialect) -> Result<()> {
        match self.dialect {
            Some(expected) if expected != actual => Err(Error::config(
                ConfigErrorKind::InvalidOption,
                format!("configured for {expected} but the connection speaks {actual}"),
            )),
            _ => Ok(()),
        }
    }
}
