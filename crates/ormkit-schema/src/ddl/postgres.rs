//! PostgreSQL DDL generator.
//!
//! PostgreSQL has real schemas, named enum types, triggers and functions,
//! and alters columns in place.

use super::{CreateTableOptions, DdlGenerator, EnumPosition, generate_create_table};
use crate::routine::{FunctionDef, FunctionParam, TriggerDef, TriggerEvent};
use ormkit_core::{
    AttributeDef, AttributeMap, DataType, Deferrable, Dialect, IsolationLevel, TableRef,
    Transaction,
};

/// DDL generator for PostgreSQL.
pub struct PostgresDdlGenerator;

const DEFAULT_SCHEMA: &str = "public";

impl PostgresDdlGenerator {
    /// Column type; enums name their per-column type, serials replace
    /// auto incremented integers.
    fn type_sql(&self, table: &TableRef, attribute: &AttributeDef) -> String {
        match (&attribute.data_type, attribute.auto_increment) {
            (DataType::Enum(_), _) => self.enum_name(table, attribute.field_name()),
            (DataType::Integer, true) => "SERIAL".to_string(),
            (DataType::BigInt, true) => "BIGSERIAL".to_string(),
            (DataType::SmallInt, true) => "SMALLSERIAL".to_string(),
            (data_type, _) => data_type.sql_name(Dialect::Postgres),
        }
    }

    fn enum_name(&self, table: &TableRef, field: &str) -> String {
        let type_name = self.quote(&format!("enum_{}_{}", table.name, field));
        match &table.schema {
            Some(schema) if schema != DEFAULT_SCHEMA => {
                format!("{}.{}", self.quote(schema), type_name)
            }
            _ => type_name,
        }
    }

    fn schema_literal(&self, table: &TableRef) -> String {
        self.literal(table.schema.as_deref().unwrap_or(DEFAULT_SCHEMA))
    }

    fn function_signature(name: &str, params: &[FunctionParam]) -> String {
        let params: Vec<String> = params
            .iter()
            .map(|p| {
                let mut parts = Vec::new();
                if let Some(direction) = &p.direction {
                    parts.push(direction.clone());
                }
                if let Some(name) = &p.name {
                    parts.push(name.clone());
                }
                parts.push(p.data_type.clone());
                parts.join(" ")
            })
            .collect();
        format!("{}({})", name, params.join(", "))
    }
}

impl DdlGenerator for PostgresDdlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn create_schema(&self, schema: &str) -> Option<String> {
        Some(format!("CREATE SCHEMA IF NOT EXISTS {};", self.quote(schema)))
    }

    fn drop_schema(&self, schema: &str) -> Option<String> {
        Some(format!("DROP SCHEMA IF EXISTS {} CASCADE;", self.quote(schema)))
    }

    fn show_schemas(&self) -> Option<String> {
        Some(
            "SELECT schema_name FROM information_schema.schemata WHERE schema_name <> 'information_schema' AND schema_name != 'public' AND schema_name !~ E'^pg_';"
                .to_string(),
        )
    }

    fn version(&self) -> String {
        "SHOW SERVER_VERSION".to_string()
    }

    fn create_table(
        &self,
        table: &TableRef,
        attributes: &AttributeMap,
        options: &CreateTableOptions,
    ) -> String {
        let type_sql = |a: &AttributeDef| self.type_sql(table, a);
        let mut sql = generate_create_table(
            Dialect::Postgres,
            table,
            attributes,
            options,
            &type_sql,
            false,
        );
        if let Some(comment) = &options.comment {
            sql.push_str(&format!(
                " COMMENT ON TABLE {} IS {};",
                self.quote_table(table),
                self.literal(comment)
            ));
        }
        sql
    }

    fn show_tables(&self, schema: Option<&str>) -> String {
        format!(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = {} AND table_type LIKE '%TABLE' AND table_name != 'spatial_ref_sys';",
            self.literal(schema.unwrap_or(DEFAULT_SCHEMA))
        )
    }

    fn describe_table(&self, table: &TableRef) -> String {
        let name = self.literal(&table.name);
        let schema = self.schema_literal(table);
        format!(
            "SELECT c.column_name AS \"Field\", c.data_type AS \"Type\", c.is_nullable AS \"Null\", \
             c.column_default AS \"Default\", CASE WHEN pk.column_name IS NULL THEN '' ELSE 'PRI' END AS \"Key\" \
             FROM information_schema.columns c LEFT JOIN (SELECT ku.column_name FROM information_schema.table_constraints tc \
             INNER JOIN information_schema.key_column_usage ku ON tc.constraint_name = ku.constraint_name \
             AND tc.table_schema = ku.table_schema WHERE tc.constraint_type = 'PRIMARY KEY' \
             AND tc.table_name = {name} AND tc.table_schema = {schema}) pk ON pk.column_name = c.column_name \
             WHERE c.table_name = {name} AND c.table_schema = {schema} ORDER BY c.ordinal_position;"
        )
    }

    fn add_column(&self, table: &TableRef, attribute: &AttributeDef) -> String {
        let style = super::ColumnStyle {
            inline_primary_key: true,
            inline_references: true,
        };
        format!(
            "ALTER TABLE {} ADD COLUMN {};",
            self.quote_table(table),
            super::format_column_def(
                Dialect::Postgres,
                attribute,
                &self.type_sql(table, attribute),
                style
            )
        )
    }

    fn remove_column(&self, table: &TableRef, column: &str) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} DROP COLUMN {};",
            self.quote_table(table),
            self.quote(column)
        ))
    }

    fn change_column(&self, table: &TableRef, attribute: &AttributeDef) -> Option<Vec<String>> {
        let prefix = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.quote_table(table),
            self.quote(attribute.field_name())
        );
        let mut statements = Vec::new();
        statements.push(if attribute.allow_null {
            format!("{prefix} DROP NOT NULL;")
        } else {
            format!("{prefix} SET NOT NULL;")
        });
        statements.push(match &attribute.default_value {
            Some(value) => format!("{prefix} SET DEFAULT {};", self.dialect().escape(value)),
            None => format!("{prefix} DROP DEFAULT;"),
        });
        let type_sql = self.type_sql(table, attribute);
        statements.push(format!(
            "{prefix} TYPE {type_sql} USING ({}::{type_sql});",
            self.quote(attribute.field_name())
        ));
        if let Some(references) = super::format_references(Dialect::Postgres, attribute) {
            statements.push(format!(
                "ALTER TABLE {} ADD FOREIGN KEY ({}) {};",
                self.quote_table(table),
                self.quote(attribute.field_name()),
                references
            ));
        }
        Some(statements)
    }

    fn rename_column(&self, table: &TableRef, from: &str, to: &AttributeDef) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {};",
            self.quote_table(table),
            self.quote(from),
            self.quote(to.field_name())
        ))
    }

    fn remove_index(&self, table: &TableRef, name: &str) -> String {
        match &table.schema {
            Some(schema) => format!(
                "DROP INDEX IF EXISTS {}.{};",
                self.quote(schema),
                self.quote(name)
            ),
            None => format!("DROP INDEX IF EXISTS {};", self.quote(name)),
        }
    }

    fn show_index(&self, table: &TableRef) -> String {
        format!(
            "SELECT indexname AS name, indexdef AS definition FROM pg_indexes WHERE tablename = {} AND schemaname = {};",
            self.literal(&table.name),
            self.schema_literal(table)
        )
    }

    fn foreign_keys(&self, table: &TableRef, _database: Option<&str>) -> String {
        format!(
            "SELECT conname AS constraint_name, pg_catalog.pg_get_constraintdef(r.oid, true) AS condef \
             FROM pg_catalog.pg_constraint r WHERE r.conrelid = (SELECT c.oid FROM pg_class c \
             INNER JOIN pg_namespace n ON n.oid = c.relnamespace WHERE c.relname = {} AND n.nspname = {} LIMIT 1) \
             AND r.contype = 'f' ORDER BY 1;",
            self.literal(&table.name),
            self.schema_literal(table)
        )
    }

    fn drop_foreign_key(&self, table: &TableRef, name: &str) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} DROP CONSTRAINT {};",
            self.quote_table(table),
            self.quote(name)
        ))
    }

    fn enum_type_name(&self, table: &TableRef, field: &str) -> Option<String> {
        Some(self.enum_name(table, field))
    }

    fn list_enums(&self, schema: &str, table_field: Option<(&TableRef, &str)>) -> Option<String> {
        let filter = match table_field {
            Some((table, field)) => format!(
                " AND t.typname={}",
                self.literal(&format!("enum_{}_{}", table.name, field))
            ),
            None => String::new(),
        };
        Some(format!(
            "SELECT t.typname enum_name, array_agg(e.enumlabel ORDER BY enumsortorder) enum_value \
             FROM pg_type t JOIN pg_enum e ON t.oid = e.enumtypid \
             JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace \
             WHERE n.nspname = {}{} GROUP BY 1",
            self.literal(schema),
            filter
        ))
    }

    fn create_enum(&self, table: &TableRef, field: &str, values: &[String]) -> Option<String> {
        let labels: Vec<String> = values.iter().map(|v| self.literal(v)).collect();
        Some(format!(
            "CREATE TYPE {} AS ENUM({});",
            self.enum_name(table, field),
            labels.join(", ")
        ))
    }

    fn add_enum_value(
        &self,
        table: &TableRef,
        field: &str,
        value: &str,
        position: &EnumPosition,
    ) -> Option<String> {
        let anchor = match position {
            EnumPosition::Before(label) => format!(" BEFORE {}", self.literal(label)),
            EnumPosition::After(label) => format!(" AFTER {}", self.literal(label)),
            EnumPosition::End => String::new(),
        };
        Some(format!(
            "ALTER TYPE {} ADD VALUE IF NOT EXISTS {}{};",
            self.enum_name(table, field),
            self.literal(value),
            anchor
        ))
    }

    fn drop_enum(&self, table: &TableRef, field: &str) -> Option<String> {
        Some(format!(
            "DROP TYPE IF EXISTS {};",
            self.enum_name(table, field)
        ))
    }

    fn drop_enum_type(&self, schema: &str, type_name: &str) -> Option<String> {
        Some(format!(
            "DROP TYPE IF EXISTS {}.{};",
            self.quote(schema),
            self.quote(type_name)
        ))
    }

    fn create_trigger(&self, trigger: &TriggerDef) -> Option<String> {
        let events: Vec<String> = trigger
            .events
            .iter()
            .map(|event| match event {
                TriggerEvent::Insert => "INSERT".to_string(),
                TriggerEvent::Update(columns) if columns.is_empty() => "UPDATE".to_string(),
                TriggerEvent::Update(columns) => {
                    let cols: Vec<String> = columns.iter().map(|c| self.quote(c)).collect();
                    format!("UPDATE OF {}", cols.join(", "))
                }
                TriggerEvent::Delete => "DELETE".to_string(),
                TriggerEvent::Truncate => "TRUNCATE".to_string(),
            })
            .collect();
        let each = if trigger.for_each_row { "ROW" } else { "STATEMENT" };
        Some(format!(
            "CREATE TRIGGER {} {} {} ON {} FOR EACH {} EXECUTE PROCEDURE {}({});",
            self.quote(&trigger.name),
            trigger.timing.as_sql(),
            events.join(" OR "),
            self.quote_table(&trigger.table),
            each,
            trigger.function,
            trigger.args.join(", ")
        ))
    }

    fn drop_trigger(&self, table: &TableRef, name: &str) -> Option<String> {
        Some(format!(
            "DROP TRIGGER {} ON {} RESTRICT;",
            self.quote(name),
            self.quote_table(table)
        ))
    }

    fn rename_trigger(&self, table: &TableRef, old: &str, new: &str) -> Option<String> {
        Some(format!(
            "ALTER TRIGGER {} ON {} RENAME TO {};",
            self.quote(old),
            self.quote_table(table),
            self.quote(new)
        ))
    }

    fn create_function(&self, function: &FunctionDef) -> Option<String> {
        let create = if function.or_replace {
            "CREATE OR REPLACE FUNCTION"
        } else {
            "CREATE FUNCTION"
        };
        let modifiers = if function.modifiers.is_empty() {
            String::new()
        } else {
            format!(" {}", function.modifiers.join(" "))
        };
        Some(format!(
            "{} {} RETURNS {} AS $func$ BEGIN {} END; $func$ language '{}'{};",
            create,
            Self::function_signature(&function.name, &function.params),
            function.return_type,
            function.body,
            function.language,
            modifiers
        ))
    }

    fn drop_function(&self, name: &str, params: &[FunctionParam]) -> Option<String> {
        Some(format!(
            "DROP FUNCTION {} RESTRICT;",
            Self::function_signature(name, params)
        ))
    }

    fn rename_function(&self, old: &str, params: &[FunctionParam], new: &str) -> Option<String> {
        Some(format!(
            "ALTER FUNCTION {} RENAME TO {};",
            Self::function_signature(old, params),
            new
        ))
    }

    fn set_autocommit(&self, _transaction: &Transaction, _value: bool) -> Option<String> {
        // autocommit cannot be switched off server side
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
        Some(format!(
            "SET TRANSACTION ISOLATION LEVEL {};",
            level.as_sql()
        ))
    }

    fn isolation_after_begin(&self) -> bool {
        true
    }

    fn defer_constraints(&self, deferrable: &Deferrable) -> Option<String> {
        let (names, mode) = match deferrable {
            Deferrable::SetDeferred(names) => (names, "DEFERRED"),
            Deferrable::SetImmediate(names) => (names, "IMMEDIATE"),
        };
        let target = if names.is_empty() {
            "ALL".to_string()
        } else {
            names
                .iter()
                .map(|n| self.quote(n))
                .collect::<Vec<_>>()
                .join(", ")
        };
        Some(format!("SET CONSTRAINTS {target} {mode};"))
    }
}
