//! SQLite DDL generator.
//!
//! SQLite cannot drop, alter or rename a column in place the way the other
//! dialects do; those operations return `None` and go through
//! [`crate::rebuild`] instead.

use super::{CreateTableOptions, DdlGenerator, generate_create_table};
use ormkit_core::{AttributeDef, AttributeMap, Dialect, IsolationLevel, TableRef, Transaction};

/// DDL generator for SQLite.
pub struct SqliteDdlGenerator;

impl SqliteDdlGenerator {
    fn type_sql(attribute: &AttributeDef) -> String {
        // AUTOINCREMENT is only accepted on an INTEGER PRIMARY KEY
        if attribute.auto_increment && attribute.primary_key {
            return "INTEGER".to_string();
        }
        attribute.data_type.sql_name(Dialect::Sqlite)
    }
}

impl DdlGenerator for SqliteDdlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn version(&self) -> String {
        "SELECT sqlite_version() as `version`;".to_string()
    }

    fn create_table(
        &self,
        table: &TableRef,
        attributes: &AttributeMap,
        options: &CreateTableOptions,
    ) -> String {
        generate_create_table(
            Dialect::Sqlite,
            table,
            attributes,
            options,
            &Self::type_sql,
            true,
        )
    }

    fn drop_table(&self, table: &TableRef, _cascade: bool) -> String {
        format!("DROP TABLE IF EXISTS {};", self.quote_table(table))
    }

    fn show_tables(&self, _schema: Option<&str>) -> String {
        "SELECT name FROM `sqlite_master` WHERE type='table' and name!='sqlite_sequence';"
            .to_string()
    }

    fn describe_table(&self, table: &TableRef) -> String {
        format!("PRAGMA TABLE_INFO({});", self.quote_table(table))
    }

    fn add_column(&self, table: &TableRef, attribute: &AttributeDef) -> String {
        let style = super::ColumnStyle {
            inline_primary_key: true,
            inline_references: true,
        };
        format!(
            "ALTER TABLE {} ADD {};",
            self.quote_table(table),
            super::format_column_def(Dialect::Sqlite, attribute, &Self::type_sql(attribute), style)
        )
    }

    fn remove_column(&self, _table: &TableRef, _column: &str) -> Option<String> {
        None
    }

    fn change_column(&self, _table: &TableRef, _attribute: &AttributeDef) -> Option<Vec<String>> {
        None
    }

    fn rename_column(&self, _table: &TableRef, _from: &str, _to: &AttributeDef) -> Option<String> {
        None
    }

    fn remove_index(&self, _table: &TableRef, name: &str) -> String {
        format!("DROP INDEX IF EXISTS {};", self.quote(name))
    }

    fn show_index(&self, table: &TableRef) -> String {
        format!("PRAGMA INDEX_LIST({});", self.quote_table(table))
    }

    fn foreign_keys(&self, table: &TableRef, _database: Option<&str>) -> String {
        format!("PRAGMA foreign_key_list({});", self.quote_table(table))
    }

    fn start_transaction(&self, transaction: &Transaction) -> String {
        if transaction.is_nested() {
            format!("SAVEPOINT {};", self.quote(transaction.id()))
        } else {
            "BEGIN DEFERRED TRANSACTION;".to_string()
        }
    }

    fn set_autocommit(&self, _transaction: &Transaction, _value: bool) -> Option<String> {
        None
    }

    fn set_isolation_level(
        &self,
        transaction: &Transaction,
        level: IsolationLevel,
    ) -> Option<String> {
        if transaction.is_nested() {
            return None;
        }
        match level {
            IsolationLevel::ReadUncommitted => Some("PRAGMA read_uncommitted = ON;".to_string()),
            IsolationLevel::ReadCommitted => Some("PRAGMA read_uncommitted = OFF;".to_string()),
            // serializable is the only mode; repeatable read cannot be chosen
            IsolationLevel::RepeatableRead | IsolationLevel::Serializable => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormkit_core::{DataType, ReferentialAction, TransactionOptions};

    fn join_table() -> AttributeMap {
        [
            AttributeDef::new("PostId", DataType::Integer)
                .primary_key()
                .references("Posts", "id")
                .on_delete(ReferentialAction::Cascade)
                .on_update(ReferentialAction::Cascade),
            AttributeDef::new("TagId", DataType::Integer)
                .primary_key()
                .references("Tags", "id")
                .on_delete(ReferentialAction::Cascade)
                .on_update(ReferentialAction::Cascade),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn autoincrement_key_is_inline() {
        let attributes: AttributeMap = [
            AttributeDef::surrogate_id(),
            AttributeDef::new("name", DataType::String(255)).unique(),
        ]
        .into_iter()
        .collect();
        let sql = SqliteDdlGenerator.create_table(
            &TableRef::new("Tags"),
            &attributes,
            &CreateTableOptions::default(),
        );
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"Tags\" (\"id\" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT, \"name\" VARCHAR(255) UNIQUE);"
        );
    }

    #[test]
    fn composite_key_is_a_table_constraint() {
        let sql = SqliteDdlGenerator.create_table(
            &TableRef::new("PostTags"),
            &join_table(),
            &CreateTableOptions::default(),
        );
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"PostTags\" (\"PostId\" INTEGER NOT NULL REFERENCES \"Posts\" (\"id\") ON DELETE CASCADE ON UPDATE CASCADE, \"TagId\" INTEGER NOT NULL REFERENCES \"Tags\" (\"id\") ON DELETE CASCADE ON UPDATE CASCADE, PRIMARY KEY (\"PostId\", \"TagId\"));"
        );
    }

    #[test]
    fn column_changes_need_a_rebuild() {
        let table = TableRef::new("users");
        let attribute = AttributeDef::new("name", DataType::Text);
        assert!(SqliteDdlGenerator.remove_column(&table, "name").is_none());
        assert!(SqliteDdlGenerator.change_column(&table, &attribute).is_none());
        assert!(
            SqliteDdlGenerator
                .rename_column(&table, "old", &attribute)
                .is_none()
        );
    }

    #[test]
    fn transaction_statements() {
        let tx = Transaction::new(1, TransactionOptions::default());
        assert_eq!(
            SqliteDdlGenerator.start_transaction(&tx),
            "BEGIN DEFERRED TRANSACTION;"
        );
        assert_eq!(SqliteDdlGenerator.set_autocommit(&tx, false), None);
        assert_eq!(
            SqliteDdlGenerator.set_isolation_level(&tx, IsolationLevel::ReadUncommitted),
            Some("PRAGMA read_uncommitted = ON;".to_string())
        );
        assert_eq!(
            SqliteDdlGenerator.set_isolation_level(&tx, IsolationLevel::Serializable),
            None
        );
    }
}
