//! MySQL DDL generator.
//!
//! MySQL ignores inline `REFERENCES`, so foreign keys are always written as
//! table constraints.

use super::{CreateTableOptions, DdlGenerator, generate_create_table};
use ormkit_core::{AttributeDef, AttributeMap, Dialect, TableRef};

/// DDL generator for MySQL.
pub struct MysqlDdlGenerator;

impl MysqlDdlGenerator {
    fn type_sql(attribute: &AttributeDef) -> String {
        attribute.data_type.sql_name(Dialect::Mysql)
    }

    fn column_def(attribute: &AttributeDef) -> String {
        let style = super::ColumnStyle {
            inline_primary_key: true,
            inline_references: false,
        };
        super::format_column_def(Dialect::Mysql, attribute, &Self::type_sql(attribute), style)
    }

    fn database_filter(&self, column: &str, database: Option<&str>) -> String {
        match database {
            Some(db) => format!("{column} = {}", self.literal(db)),
            None => format!("{column} = DATABASE()"),
        }
    }
}

impl DdlGenerator for MysqlDdlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn create_schema(&self, schema: &str) -> Option<String> {
        Some(format!("CREATE SCHEMA IF NOT EXISTS {};", self.quote(schema)))
    }

    fn drop_schema(&self, schema: &str) -> Option<String> {
        Some(format!("DROP SCHEMA IF EXISTS {};", self.quote(schema)))
    }

    fn show_schemas(&self) -> Option<String> {
        Some(
            "SELECT SCHEMA_NAME as schema_name FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME NOT IN ('MYSQL', 'INFORMATION_SCHEMA', 'PERFORMANCE_SCHEMA', 'SYS');"
                .to_string(),
        )
    }

    fn version(&self) -> String {
        "SELECT VERSION() as `version`".to_string()
    }

    fn create_table(
        &self,
        table: &TableRef,
        attributes: &AttributeMap,
        options: &CreateTableOptions,
    ) -> String {
        let mut sql = generate_create_table(
            Dialect::Mysql,
            table,
            attributes,
            options,
            &Self::type_sql,
            false,
        );
        // drop the trailing ';' to append table options
        sql.pop();
        sql.push_str(&format!(
            " ENGINE={}",
            options.engine.as_deref().unwrap_or("InnoDB")
        ));
        if let Some(charset) = &options.charset {
            sql.push_str(&format!(" DEFAULT CHARSET={charset}"));
        }
        if let Some(comment) = &options.comment {
            sql.push_str(&format!(" COMMENT {}", self.literal(comment)));
        }
        sql.push(';');
        sql
    }

    fn rename_table(&self, from: &TableRef, to: &TableRef) -> String {
        format!(
            "RENAME TABLE {} TO {};",
            self.quote_table(from),
            self.quote_table(to)
        )
    }

    fn show_tables(&self, schema: Option<&str>) -> String {
        format!(
            "SELECT TABLE_NAME AS table_name FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE' AND {};",
            self.database_filter("TABLE_SCHEMA", schema)
        )
    }

    fn describe_table(&self, table: &TableRef) -> String {
        format!("SHOW FULL COLUMNS FROM {};", self.quote_table(table))
    }

    fn add_column(&self, table: &TableRef, attribute: &AttributeDef) -> String {
        let mut sql = format!(
            "ALTER TABLE {} ADD {}",
            self.quote_table(table),
            Self::column_def(attribute)
        );
        if let Some(references) = super::format_references(Dialect::Mysql, attribute) {
            sql.push_str(&format!(
                ", ADD FOREIGN KEY ({}) {}",
                self.quote(attribute.field_name()),
                references
            ));
        }
        sql.push(';');
        sql
    }

    fn remove_column(&self, table: &TableRef, column: &str) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} DROP {};",
            self.quote_table(table),
            self.quote(column)
        ))
    }

    fn change_column(&self, table: &TableRef, attribute: &AttributeDef) -> Option<Vec<String>> {
        let field = self.quote(attribute.field_name());
        let mut sql = format!(
            "ALTER TABLE {} CHANGE {} {}",
            self.quote_table(table),
            field,
            Self::column_def(attribute)
        );
        if let Some(references) = super::format_references(Dialect::Mysql, attribute) {
            sql.push_str(&format!(", ADD FOREIGN KEY ({field}) {references}"));
        }
        sql.push(';');
        Some(vec![sql])
    }

    fn rename_column(&self, table: &TableRef, from: &str, to: &AttributeDef) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} CHANGE {} {};",
            self.quote_table(table),
            self.quote(from),
            Self::column_def(to)
        ))
    }

    fn remove_index(&self, table: &TableRef, name: &str) -> String {
        format!(
            "DROP INDEX {} ON {};",
            self.quote(name),
            self.quote_table(table)
        )
    }

    fn show_index(&self, table: &TableRef) -> String {
        format!("SHOW INDEX FROM {};", self.quote_table(table))
    }

    fn foreign_keys(&self, table: &TableRef, database: Option<&str>) -> String {
        format!(
            "SELECT CONSTRAINT_NAME as constraint_name, CONSTRAINT_NAME as constraintName, \
             TABLE_NAME as tableName, COLUMN_NAME as columnName, \
             REFERENCED_TABLE_NAME as referencedTableName, REFERENCED_COLUMN_NAME as referencedColumnName \
             FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE WHERE TABLE_NAME = {} AND CONSTRAINT_NAME != 'PRIMARY' \
             AND {} AND REFERENCED_TABLE_NAME IS NOT NULL;",
            self.literal(&table.name),
            self.database_filter("CONSTRAINT_SCHEMA", database)
        )
    }

    fn drop_foreign_key(&self, table: &TableRef, name: &str) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} DROP FOREIGN KEY {};",
            self.quote_table(table),
            self.quote(name)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormkit_core::{DataType, ReferentialAction, Transaction, TransactionOptions};

    #[test]
    fn create_table_moves_references_to_constraints() {
        let attributes: AttributeMap = [
            AttributeDef::surrogate_id(),
            AttributeDef::new("userId", DataType::Integer)
                .references("users", "id")
                .on_delete(ReferentialAction::SetNull),
        ]
        .into_iter()
        .collect();
        let sql = MysqlDdlGenerator.create_table(
            &TableRef::new("posts"),
            &attributes,
            &CreateTableOptions::default(),
        );
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS `posts` (`id` INTEGER NOT NULL auto_increment, `userId` INTEGER, PRIMARY KEY (`id`), FOREIGN KEY (`userId`) REFERENCES `users` (`id`) ON DELETE SET NULL) ENGINE=InnoDB;"
        );
    }

    #[test]
    fn rename_column_restates_definition() {
        let to = AttributeDef::new("full_name", DataType::String(100)).not_null();
        assert_eq!(
            MysqlDdlGenerator.rename_column(&TableRef::new("users"), "name", &to),
            Some("ALTER TABLE `users` CHANGE `name` `full_name` VARCHAR(100) NOT NULL;".to_string())
        );
    }

    #[test]
    fn autocommit_and_isolation() {
        let tx = Transaction::new(1, TransactionOptions::default());
        assert_eq!(
            MysqlDdlGenerator.set_autocommit(&tx, false),
            Some("SET autocommit = 0;".to_string())
        );
        assert_eq!(
            MysqlDdlGenerator.set_isolation_level(&tx, ormkit_core::IsolationLevel::Serializable),
            Some("SET SESSION TRANSACTION ISOLATION LEVEL SERIALIZABLE;".to_string())
        );
        assert_eq!(MysqlDdlGenerator.start_transaction(&tx), "START TRANSACTION;");
    }
}
