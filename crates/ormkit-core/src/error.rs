//! Error types for ormkit operations.
//!
//! Definition-time mistakes (a missing `through` model, a self-association
//! without an alias, an accessor name clash) are [`ConfigError`]s and are
//! returned before any SQL is generated. Statement failures are
//! [`DatabaseError`]s and always carry the SQL text that failed.

use std::fmt;

/// The primary error type for all ormkit operations.
#[derive(Debug)]
pub enum Error {
    /// Cannot open or reach the database
    Connection(ConnectionError),
    /// Statement execution failed
    Database(DatabaseError),
    /// Value conversion failed
    Type(TypeError),
    /// Transaction state errors
    Transaction(TransactionError),
    /// Table or column lookups that came back empty
    Schema(SchemaError),
    /// Definition-time and programming errors
    Config(ConfigError),
    /// Input rejected before any SQL was generated
    Validation(ValidationError),
    /// I/O errors
    Io(std::io::Error),
    /// Operation timed out
    Timeout,
    /// Operation was cancelled via asupersync
    Cancelled,
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to open the connection
    Connect,
    /// Connection was lost or closed during an operation
    Disconnected,
    /// The storage could not be found or created
    NotFound,
}

#[derive(Debug)]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub sql: Option<String>,
    pub sqlstate: Option<String>,
    pub message: String,
    pub detail: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, not null)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied or read-only storage
    Permission,
    /// Database is locked or busy
    Busy,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// A transaction is already running on the connection
    AlreadyActive,
    /// No transaction is running on the connection
    NotActive,
}

#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Table not found
    TableNotFound,
    /// Column not found
    ColumnNotFound,
    /// Invalid schema definition
    Invalid,
}

#[derive(Debug)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// A many-to-many association was declared without a join model
    MissingThrough,
    /// A many-to-many self-association was declared without an alias
    MissingAlias,
    /// An accessor or alias collides with an existing attribute
    NamingCollision,
    /// A referenced model is not registered
    UnknownModel,
    /// A model with the same name is already registered
    DuplicateModel,
    /// A transaction operation was called without a usable handle
    MissingTransaction,
    /// `raw_select` was called without an attribute selector
    MissingAttributeSelector,
    /// Any other invalid option
    InvalidOption,
}

/// Validation error for inputs rejected before SQL generation.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub errors: Vec<FieldValidationError>,
}

/// A single validation error for a field.
#[derive(Debug, Clone)]
pub struct FieldValidationError {
    pub field: String,
    pub kind: ValidationErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Required value is missing
    Required,
    /// ENUM attribute declared without values
    EnumValues,
    /// Custom validation failed
    Custom,
}

impl ValidationError {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add a field validation error.
    pub fn add(
        &mut self,
        field: impl Into<String>,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) {
        self.errors.push(FieldValidationError {
            field: field.into(),
            kind,
            message: message.into(),
        });
    }

    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(field, ValidationErrorKind::Required, "is required");
    }

    pub fn add_enum_values(&mut self, field: impl Into<String>) {
        self.add(
            field,
            ValidationErrorKind::EnumValues,
            "Values for ENUM haven't been defined.",
        );
    }

    pub fn add_custom(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.add(field, ValidationErrorKind::Custom, message);
    }

    /// Convert to Result, returning Ok(()) if no errors, Err(self) otherwise.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Default for ValidationError {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigError {
    pub fn new(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }
}

impl SchemaError {
    pub fn new(kind: SchemaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            sql: None,
            sqlstate: None,
            message: message.into(),
            detail: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Attach the failing statement to a driver error.
    ///
    /// Errors that already describe a statement keep their SQL unless it was
    /// missing. Connection loss, cancellation and timeouts pass through
    /// untouched; everything else becomes a `Database` error whose source is
    /// the original error.
    pub fn wrap(err: Error, sql: &str) -> Error {
        match err {
            Error::Database(mut db) => {
                if db.sql.is_none() {
                    db.sql = Some(sql.to_string());
                }
                Error::Database(db)
            }
            Error::Connection(_) | Error::Cancelled | Error::Timeout => err,
            other => Error::Database(DatabaseError {
                kind: DatabaseErrorKind::Database,
                sql: Some(sql.to_string()),
                sqlstate: None,
                message: other.to_string(),
                detail: None,
                source: Some(Box::new(other)),
            }),
        }
    }

    /// Is this a unique or primary key violation?
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate.as_deref() == Some("23505")
            || (self.kind == DatabaseErrorKind::Constraint && self.message.contains("UNIQUE"))
    }
}

impl Error {
    pub fn config(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Error::Config(ConfigError::new(kind, message))
    }

    pub fn schema(kind: SchemaErrorKind, message: impl Into<String>) -> Self {
        Error::Schema(SchemaError::new(kind, message))
    }

    /// Is this a retryable error (busy database, timeouts)?
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Database(d) => d.kind == DatabaseErrorKind::Busy,
            Error::Timeout => true,
            _ => false,
        }
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Io(_))
    }

    /// Is this a definition-time configuration error?
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    pub fn config_kind(&self) -> Option<ConfigErrorKind> {
        match self {
            Error::Config(c) => Some(c.kind),
            _ => None,
        }
    }

    /// Get SQLSTATE if available (e.g., "23505" for unique violation)
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Database(d) => d.sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Database(d) => d.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Database(e) => write!(f, "Database error: {}", e),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Schema(e) => write!(f, "Schema error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Timeout => write!(f, "Operation timed out"),
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Database(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Validation(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, " (SQLSTATE {})", sqlstate)?;
        }
        if let Some(sql) = &self.sql {
            write!(f, " [sql: {}]", sql)?;
        }
        Ok(())
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "validation passed")
        } else if self.errors.len() == 1 {
            let err = &self.errors[0];
            write!(f, "validation error on '{}': {}", err.field, err.message)
        } else {
            writeln!(f, "validation errors:")?;
            for err in &self.errors {
                writeln!(f, "  - {}: {}", err.field, err.message)?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<DatabaseError> for Error {
    fn from(err: DatabaseError) -> Self {
        Error::Database(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_attaches_sql_to_driver_errors() {
        let err = DatabaseError::wrap(
            Error::Database(DatabaseError::new(DatabaseErrorKind::Syntax, "near FORM")),
            "SELECT * FORM users",
        );
        assert_eq!(err.sql(), Some("SELECT * FORM users"));
        assert!(err.to_string().contains("near FORM"));
    }

    #[test]
    fn wrap_keeps_existing_sql() {
        let inner = DatabaseError::new(DatabaseErrorKind::Constraint, "UNIQUE failed")
            .with_sql("INSERT INTO a VALUES (1)");
        let err = DatabaseError::wrap(Error::Database(inner), "other");
        assert_eq!(err.sql(), Some("INSERT INTO a VALUES (1)"));
    }

    #[test]
    fn wrap_converts_foreign_errors() {
        let err = DatabaseError::wrap(Error::Custom("boom".into()), "DELETE FROM t");
        match &err {
            Error::Database(db) => {
                assert_eq!(db.kind, DatabaseErrorKind::Database);
                assert_eq!(db.sql.as_deref(), Some("DELETE FROM t"));
            }
            other => panic!("expected database error, got {other:?}"),
        }
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn wrap_passes_cancellation_through() {
        assert!(matches!(
            DatabaseError::wrap(Error::Cancelled, "SELECT 1"),
            Error::Cancelled
        ));
    }

    #[test]
    fn config_error_display() {
        let err = Error::config(ConfigErrorKind::MissingThrough, "through is required");
        assert_eq!(err.to_string(), "Configuration error: through is required");
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::MissingThrough));
    }

    #[test]
    fn validation_error_into_result() {
        let mut errs = ValidationError::new();
        assert!(errs.clone().into_result().is_ok());
        errs.add_enum_values("status");
        let err = errs.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error on 'status': Values for ENUM haven't been defined."
        );
    }
}
