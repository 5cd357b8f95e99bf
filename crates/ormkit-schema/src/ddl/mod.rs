//! DDL (Data Definition Language) generation.
//!
//! A [`DdlGenerator`] turns structured table, attribute and transaction
//! descriptions into SQL text for one dialect. Operations a dialect cannot
//! express return `None`; callers treat that as a no-op or, for column
//! changes on SQLite, as a request to rebuild the table.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MysqlDdlGenerator;
pub use postgres::PostgresDdlGenerator;
pub use sqlite::SqliteDdlGenerator;

use crate::routine::{FunctionDef, FunctionParam, TriggerDef};
use ormkit_core::{
    AttributeDef, AttributeMap, Deferrable, Dialect, IndexDef, IsolationLevel, TableRef,
    Transaction, Unique, UniqueKey, Value,
};

/// Where a new enum label goes relative to the existing ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumPosition {
    Before(String),
    After(String),
    End,
}

/// Table level options for CREATE TABLE.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateTableOptions {
    /// Extra composite unique constraints
    pub unique_keys: Vec<UniqueKey>,
    /// MySQL storage engine
    pub engine: Option<String>,
    /// MySQL default character set
    pub charset: Option<String>,
    pub comment: Option<String>,
}

/// Generates DDL SQL statements for one dialect.
pub trait DdlGenerator: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn quote(&self, name: &str) -> String {
        self.dialect().quote_identifier(name)
    }

    fn quote_table(&self, table: &TableRef) -> String {
        table.quoted(self.dialect())
    }

    /// A string literal.
    fn literal(&self, s: &str) -> String {
        self.dialect().escape(&Value::Text(s.to_string()))
    }

    // Schemas

    fn create_schema(&self, _schema: &str) -> Option<String> {
        None
    }

    fn drop_schema(&self, _schema: &str) -> Option<String> {
        None
    }

    fn show_schemas(&self) -> Option<String> {
        None
    }

    fn version(&self) -> String;

    // Tables

    fn create_table(
        &self,
        table: &TableRef,
        attributes: &AttributeMap,
        options: &CreateTableOptions,
    ) -> String;

    fn drop_table(&self, table: &TableRef, cascade: bool) -> String {
        let cascade = if cascade { " CASCADE" } else { "" };
        format!("DROP TABLE IF EXISTS {}{};", self.quote_table(table), cascade)
    }

    fn rename_table(&self, from: &TableRef, to: &TableRef) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {};",
            self.quote_table(from),
            self.quote_table(to)
        )
    }

    fn show_tables(&self, schema: Option<&str>) -> String;

    fn describe_table(&self, table: &TableRef) -> String;

    // Columns

    fn add_column(&self, table: &TableRef, attribute: &AttributeDef) -> String;

    /// `None` when the dialect must rebuild the table instead.
    fn remove_column(&self, table: &TableRef, column: &str) -> Option<String>;

    /// `None` when the dialect must rebuild the table instead.
    fn change_column(&self, table: &TableRef, attribute: &AttributeDef) -> Option<Vec<String>>;

    /// `None` when the dialect must rebuild the table instead.
    fn rename_column(&self, table: &TableRef, from: &str, to: &AttributeDef) -> Option<String>;

    // Indexes and constraints

    fn add_index(&self, table: &TableRef, index: &IndexDef) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let fields: Vec<String> = index.fields.iter().map(|f| self.quote(f)).collect();
        format!(
            "CREATE {}INDEX {} ON {} ({});",
            unique,
            self.quote(&index_name(&table.name, index)),
            self.quote_table(table),
            fields.join(", ")
        )
    }

    fn remove_index(&self, table: &TableRef, name: &str) -> String;

    fn show_index(&self, table: &TableRef) -> String;

    /// Foreign keys declared on a table. `database` narrows the lookup
    /// where the catalog is shared between databases.
    fn foreign_keys(&self, table: &TableRef, database: Option<&str>) -> String;

    fn drop_foreign_key(&self, _table: &TableRef, _name: &str) -> Option<String> {
        None
    }

    // Enumerated types (PostgreSQL)

    /// Qualified name of the enum type backing `table.field`.
    fn enum_type_name(&self, _table: &TableRef, _field: &str) -> Option<String> {
        None
    }

    /// Enum types of a schema, or the one backing `table.field`.
    fn list_enums(&self, _schema: &str, _table_field: Option<(&TableRef, &str)>) -> Option<String> {
        None
    }

    fn create_enum(&self, _table: &TableRef, _field: &str, _values: &[String]) -> Option<String> {
        None
    }

    fn add_enum_value(
        &self,
        _table: &TableRef,
        _field: &str,
        _value: &str,
        _position: &EnumPosition,
    ) -> Option<String> {
        None
    }

    fn drop_enum(&self, _table: &TableRef, _field: &str) -> Option<String> {
        None
    }

    /// Drop an enum type by its catalog name.
    fn drop_enum_type(&self, _schema: &str, _type_name: &str) -> Option<String> {
        None
    }

    // Triggers and functions

    fn create_trigger(&self, _trigger: &TriggerDef) -> Option<String> {
        None
    }

    fn drop_trigger(&self, _table: &TableRef, _name: &str) -> Option<String> {
        None
    }

    fn rename_trigger(&self, _table: &TableRef, _old: &str, _new: &str) -> Option<String> {
        None
    }

    fn create_function(&self, _function: &FunctionDef) -> Option<String> {
        None
    }

    fn drop_function(&self, _name: &str, _params: &[FunctionParam]) -> Option<String> {
        None
    }

    fn rename_function(
        &self,
        _old: &str,
        _params: &[FunctionParam],
        _new: &str,
    ) -> Option<String> {
        None
    }

    // Transactions

    fn start_transaction(&self, transaction: &Transaction) -> String {
        if transaction.is_nested() {
            format!("SAVEPOINT {};", self.quote(transaction.id()))
        } else {
            "START TRANSACTION;".to_string()
        }
    }

    fn set_autocommit(&self, transaction: &Transaction, value: bool) -> Option<String> {
        if transaction.is_nested() {
            return None;
        }
        Some(format!("SET autocommit = {};", u8::from(value)))
    }

    fn set_isolation_level(
        &self,
        transaction: &Transaction,
        level: IsolationLevel,
    ) -> Option<String> {
        if transaction.is_nested() {
            return None;
        }
        Some(format!(
            "SET SESSION TRANSACTION ISOLATION LEVEL {};",
            level.as_sql()
        ))
    }

    /// Whether the isolation level statement must follow the begin statement.
    fn isolation_after_begin(&self) -> bool {
        false
    }

    fn defer_constraints(&self, _deferrable: &Deferrable) -> Option<String> {
        None
    }

    fn commit_transaction(&self, transaction: &Transaction) -> Option<String> {
        if transaction.is_nested() {
            return None;
        }
        Some("COMMIT;".to_string())
    }

    fn rollback_transaction(&self, transaction: &Transaction) -> String {
        if transaction.is_nested() {
            format!("ROLLBACK TO SAVEPOINT {};", self.quote(transaction.id()))
        } else {
            "ROLLBACK;".to_string()
        }
    }
}

/// Create a DDL generator for the given dialect.
pub fn generator_for_dialect(dialect: Dialect) -> Box<dyn DdlGenerator> {
    match dialect {
        Dialect::Sqlite => Box::new(SqliteDdlGenerator),
        Dialect::Mysql => Box::new(MysqlDdlGenerator),
        Dialect::Postgres => Box::new(PostgresDdlGenerator),
    }
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Index name, generated from table and fields when none was given.
pub(crate) fn index_name(table: &str, index: &IndexDef) -> String {
    index
        .name
        .clone()
        .unwrap_or_else(|| format!("{}_{}", table, index.fields.join("_")).to_lowercase())
}

/// How one column definition is rendered.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnStyle {
    /// Emit `PRIMARY KEY` inline instead of as a table constraint
    pub inline_primary_key: bool,
    /// Emit `REFERENCES` inline instead of as a table constraint
    pub inline_references: bool,
}

/// Format a column definition for CREATE TABLE or ADD COLUMN.
pub(crate) fn format_column_def(
    dialect: Dialect,
    attribute: &AttributeDef,
    type_sql: &str,
    style: ColumnStyle,
) -> String {
    let mut parts = vec![dialect.quote_identifier(attribute.field_name()), type_sql.to_string()];

    if !attribute.allow_null || attribute.primary_key {
        parts.push("NOT NULL".to_string());
    }

    if dialect == Dialect::Mysql && attribute.auto_increment {
        parts.push("auto_increment".to_string());
    }

    if attribute.unique == Some(Unique::Flag(true)) {
        parts.push("UNIQUE".to_string());
    }

    if let Some(default) = &attribute.default_value {
        if !matches!(default, Value::Default) {
            parts.push(format!("DEFAULT {}", dialect.escape(default)));
        }
    }

    if style.inline_primary_key && attribute.primary_key {
        parts.push("PRIMARY KEY".to_string());
        if dialect == Dialect::Sqlite && attribute.auto_increment {
            parts.push("AUTOINCREMENT".to_string());
        }
    }

    if style.inline_references {
        if let Some(references) = format_references(dialect, attribute) {
            parts.push(references);
        }
    }

    parts.join(" ")
}

/// `REFERENCES t (k) ON DELETE .. ON UPDATE ..` for a key attribute.
pub(crate) fn format_references(dialect: Dialect, attribute: &AttributeDef) -> Option<String> {
    let references = attribute.references.as_ref()?;
    let mut sql = format!(
        "REFERENCES {} ({})",
        dialect.quote_identifiers(&references.model),
        dialect.quote_identifier(&references.key)
    );
    if let Some(action) = attribute.on_delete {
        sql.push_str(" ON DELETE ");
        sql.push_str(action.as_sql());
    }
    if let Some(action) = attribute.on_update {
        sql.push_str(" ON UPDATE ");
        sql.push_str(action.as_sql());
    }
    Some(sql)
}

/// Named unique groups of an attribute table plus the extra keys.
///
/// Returns `(name, fields)` pairs in declaration order; single column
/// `Unique::Flag(true)` markers are rendered inline and are not included.
pub(crate) fn unique_groups(
    attributes: &AttributeMap,
    extra: &[UniqueKey],
) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for attribute in attributes {
        if let Some(Unique::Named(name)) = &attribute.unique {
            let field = attribute.field_name().to_string();
            match groups.iter_mut().find(|(n, _)| n == name) {
                Some((_, fields)) => fields.push(field),
                None => groups.push((name.clone(), vec![field])),
            }
        }
    }
    for key in extra {
        if !groups.iter().any(|(n, _)| n == &key.name) {
            groups.push((key.name.clone(), key.fields.clone()));
        }
    }
    groups
}

/// Assemble a CREATE TABLE statement.
///
/// A single primary key column is declared inline when `inline_single_pk`
/// is set (needed for SQLite `AUTOINCREMENT`), otherwise all primary key
/// columns go into a table level constraint.
pub(crate) fn generate_create_table(
    dialect: Dialect,
    table: &TableRef,
    attributes: &AttributeMap,
    options: &CreateTableOptions,
    type_sql: &dyn Fn(&AttributeDef) -> String,
    inline_single_pk: bool,
) -> String {
    let pk_fields: Vec<&str> = attributes
        .iter()
        .filter(|a| a.primary_key)
        .map(AttributeDef::field_name)
        .collect();
    let style = ColumnStyle {
        inline_primary_key: inline_single_pk && pk_fields.len() == 1,
        inline_references: dialect != Dialect::Mysql,
    };

    tracing::debug!(
        dialect = dialect.name(),
        table = %table,
        columns = attributes.len(),
        "Generating CREATE TABLE DDL"
    );

    let mut parts: Vec<String> = attributes
        .iter()
        .map(|a| format_column_def(dialect, a, &type_sql(a), style))
        .collect();

    if !pk_fields.is_empty() && !style.inline_primary_key {
        let cols: Vec<String> = pk_fields
            .iter()
            .map(|f| dialect.quote_identifier(f))
            .collect();
        parts.push(format!("PRIMARY KEY ({})", cols.join(", ")));
    }

    for (name, fields) in unique_groups(attributes, &options.unique_keys) {
        let cols: Vec<String> = fields.iter().map(|f| dialect.quote_identifier(f)).collect();
        parts.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            dialect.quote_identifier(&name),
            cols.join(", ")
        ));
    }

    if !style.inline_references {
        for attribute in attributes {
            if let Some(references) = format_references(dialect, attribute) {
                parts.push(format!(
                    "FOREIGN KEY ({}) {}",
                    dialect.quote_identifier(attribute.field_name()),
                    references
                ));
            }
        }
    }

    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        table.quoted(dialect),
        parts.join(", ")
    );
    tracing::trace!(sql = %sql, "Generated CREATE TABLE statement");
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormkit_core::{DataType, ReferentialAction};

    #[test]
    fn column_def_with_default_and_reference() {
        let attribute = AttributeDef::new("authorId", DataType::Integer)
            .field("author_id")
            .not_null()
            .default_value(0)
            .references("users", "id")
            .on_delete(ReferentialAction::Cascade);
        let style = ColumnStyle {
            inline_primary_key: false,
            inline_references: true,
        };
        assert_eq!(
            format_column_def(Dialect::Postgres, &attribute, "INTEGER", style),
            "\"author_id\" INTEGER NOT NULL DEFAULT 0 REFERENCES \"users\" (\"id\") ON DELETE CASCADE"
        );
    }

    #[test]
    fn unique_groups_merge_named_markers() {
        let attributes: AttributeMap = [
            AttributeDef::new("a", DataType::Integer).unique_named("pair"),
            AttributeDef::new("b", DataType::Integer).unique_named("pair"),
            AttributeDef::new("c", DataType::Integer).unique(),
        ]
        .into_iter()
        .collect();
        let groups = unique_groups(&attributes, &[]);
        assert_eq!(
            groups,
            vec![("pair".to_string(), vec!["a".to_string(), "b".to_string()])]
        );
    }

    #[test]
    fn generated_index_name() {
        let index = IndexDef::new(["PostId", "TagId"]);
        assert_eq!(index_name("PostTags", &index), "posttags_postid_tagid");
    }

    #[test]
    fn nested_transactions_use_savepoints() {
        let generator = generator_for_dialect(Dialect::Postgres);
        let tx = Transaction::new(1, ormkit_core::TransactionOptions::default());
        let sp = tx.savepoint();
        assert_eq!(generator.start_transaction(&tx), "START TRANSACTION;");
        assert_eq!(
            generator.start_transaction(&sp),
            format!("SAVEPOINT \"{}\";", sp.id())
        );
        assert_eq!(generator.commit_transaction(&sp), None);
        assert_eq!(
            generator.rollback_transaction(&sp),
            format!("ROLLBACK TO SAVEPOINT \"{}\";", sp.id())
        );
        assert_eq!(generator.rollback_transaction(&tx), "ROLLBACK;");
    }
}
