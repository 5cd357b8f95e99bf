//! Schema operations: schemas, tables, columns, indexes, enums, triggers
//! and functions.

use super::QueryInterface;
use crate::options::{DropOptions, QueryOptions};
use crate::result::QueryResult;
use ormkit_core::{
    AttributeDef, AttributeMap, Connection, Cx, DataType, Dialect, Error, IndexDef, ModelDef,
    Outcome, QueryType, Row, SchemaErrorKind, TableRef, ValidationError, Value, try_outcome,
    try_result,
};
use ormkit_schema::{
    ColumnChange, CreateTableOptions, FunctionDef, FunctionParam, TableDescription, TriggerDef,
    apply_foreign_keys, missing_labels, parse_enum_labels, rebuild_table,
};
use std::collections::BTreeMap;

/// Schema Postgres resolves unqualified names against.
const POSTGRES_DEFAULT_SCHEMA: &str = "public";

const SQLITE_FOREIGN_KEYS: &str = "PRAGMA foreign_keys;";
const SQLITE_FOREIGN_KEYS_OFF: &str = "PRAGMA foreign_keys = OFF;";
const SQLITE_FOREIGN_KEYS_ON: &str = "PRAGMA foreign_keys = ON;";

/// `constraint_name` of each foreign key row.
pub fn constraint_names(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get_by_name("constraint_name"))
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn text_column(row: &Row, name: &str) -> Option<String> {
    row.get_by_name(name)
        .or_else(|| row.get(0))
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl<C: Connection> QueryInterface<C> {
    fn skip_unsupported(&self, operation: &str) -> Outcome<(), Error> {
        tracing::warn!(
            dialect = %self.dialect,
            operation,
            "Not supported by this dialect; skipping"
        );
        Outcome::Ok(())
    }

    async fn execute_optional(
        &self,
        cx: &Cx,
        sql: Option<String>,
        operation: &str,
    ) -> Outcome<(), Error> {
        match sql {
            Some(sql) => {
                try_outcome!(self.execute_raw(cx, &sql).await);
                Outcome::Ok(())
            }
            None => self.skip_unsupported(operation),
        }
    }

    // Schemas

    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn create_schema(&self, cx: &Cx, schema: &str) -> Outcome<(), Error> {
        let sql = self.generator.create_schema(schema);
        try_outcome!(self.execute_optional(cx, sql, "create_schema").await);
        tracing::info!(schema, "Created schema");
        Outcome::Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn drop_schema(&self, cx: &Cx, schema: &str) -> Outcome<(), Error> {
        let sql = self.generator.drop_schema(schema);
        try_outcome!(self.execute_optional(cx, sql, "drop_schema").await);
        tracing::info!(schema, "Dropped schema");
        Outcome::Ok(())
    }

    /// Schema names, flattened from the `schema_name` column.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn show_all_schemas(&self, cx: &Cx) -> Outcome<Vec<String>, Error> {
        let Some(sql) = self.generator.show_schemas() else {
            return Outcome::Ok(Vec::new());
        };
        let rows = try_outcome!(self.select_rows(cx, &sql, &[]).await);
        Outcome::Ok(
            rows.iter()
                .filter_map(|row| text_column(row, "schema_name"))
                .collect(),
        )
    }

    /// Drop every schema not in `skip`; dialects without schemas drop every
    /// table instead.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn drop_all_schemas(&self, cx: &Cx, skip: &[&str]) -> Outcome<(), Error> {
        if !self.dialect.supports_schemas() {
            return self.drop_all_tables(cx, &[]).await;
        }
        let schemas = try_outcome!(self.show_all_schemas(cx).await);
        for schema in schemas.iter().filter(|s| !skip.contains(&s.as_str())) {
            try_outcome!(self.drop_schema(cx, schema).await);
        }
        Outcome::Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn database_version(&self, cx: &Cx) -> Outcome<String, Error> {
        let sql = self.generator.version();
        let options = QueryOptions::default().tagged(QueryType::Version);
        match try_outcome!(self.run(cx, &sql, &[], &options, None, None).await) {
            QueryResult::Version(version) => Outcome::Ok(version),
            _ => Outcome::Ok(String::new()),
        }
    }

    // Tables

    /// Create a table.
    ///
    /// ENUM attributes without values are rejected before any SQL is sent.
    /// On Postgres each ENUM type is created or brought up to date first,
    /// and only then is the table created.
    #[tracing::instrument(level = "debug", skip(self, cx, attributes, options))]
    pub async fn create_table(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        attributes: &AttributeMap,
        options: &CreateTableOptions,
    ) -> Outcome<(), Error> {
        let table = self.table(table);
        let mut errors = ValidationError::new();
        for attribute in attributes.iter() {
            if matches!(&attribute.data_type, DataType::Enum(values) if values.is_empty()) {
                errors.add_enum_values(attribute.name.as_str());
            }
        }
        if let Err(errors) = errors.into_result() {
            return Outcome::Err(Error::Validation(errors));
        }

        if self.dialect == Dialect::Postgres {
            for attribute in attributes.iter().filter(|a| a.data_type.is_enum()) {
                try_outcome!(self.sync_enum(cx, &table, attribute).await);
            }
        }

        let sql = self.generator.create_table(&table, attributes, options);
        try_outcome!(self.execute_raw(cx, &sql).await);
        tracing::info!(table = %table, columns = attributes.len(), "Created table");
        Outcome::Ok(())
    }

    /// Create the table of a model from its attributes.
    pub async fn create_model_table(
        &self,
        cx: &Cx,
        model: &ModelDef,
        options: &CreateTableOptions,
    ) -> Outcome<(), Error> {
        self.create_table(cx, model.table_ref(), &model.attributes, options)
            .await
    }

    /// Create the enum type behind `attribute`, or add the labels it is
    /// missing at their declared positions.
    async fn sync_enum(&self, cx: &Cx, table: &TableRef, attribute: &AttributeDef) -> Outcome<(), Error> {
        let Some(values) = attribute.data_type.enum_values() else {
            return Outcome::Ok(());
        };
        let field = attribute.field_name();
        let schema = table.schema.as_deref().unwrap_or(POSTGRES_DEFAULT_SCHEMA);
        let Some(list_sql) = self.generator.list_enums(schema, Some((table, field))) else {
            return Outcome::Ok(());
        };
        let rows = try_outcome!(self.select_rows(cx, &list_sql, &[]).await);

        let statements: Vec<String> = match rows.first() {
            None => self
                .generator
                .create_enum(table, field, values)
                .into_iter()
                .collect(),
            Some(row) => {
                let existing = row
                    .get_by_name("enum_value")
                    .map(parse_enum_labels)
                    .unwrap_or_default();
                missing_labels(values, &existing)
                    .iter()
                    .filter_map(|(label, position)| {
                        self.generator.add_enum_value(table, field, label, position)
                    })
                    .collect()
            }
        };
        if !statements.is_empty() {
            tracing::info!(table = %table, field, statements = statements.len(), "Syncing enum type");
        }
        self.execute_all(cx, &statements).await
    }

    /// Drop a table; on Postgres the enum types of its registered model go
    /// with it.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn drop_table(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        options: DropOptions,
    ) -> Outcome<(), Error> {
        let table = self.table(table);
        let sql = self.generator.drop_table(&table, options.cascading());
        try_outcome!(self.execute_raw(cx, &sql).await);

        if self.dialect == Dialect::Postgres {
            if let Some(model) = self.model_by_table(&table) {
                let statements: Vec<String> = model
                    .attributes
                    .iter()
                    .filter(|a| a.data_type.is_enum())
                    .filter_map(|a| self.generator.drop_enum(&table, a.field_name()))
                    .collect();
                try_outcome!(self.execute_all(cx, &statements).await);
            }
        }
        tracing::info!(table = %table, "Dropped table");
        Outcome::Ok(())
    }

    /// Drop every table not named in `skip`.
    ///
    /// SQLite turns foreign key enforcement off around the drops when it was
    /// on; the other dialects drop the foreign keys first.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn drop_all_tables(&self, cx: &Cx, skip: &[&str]) -> Outcome<(), Error> {
        let tables: Vec<TableRef> = try_outcome!(self.show_all_tables(cx).await)
            .into_iter()
            .filter(|name| !skip.contains(&name.as_str()))
            .map(|name| self.table(name))
            .collect();

        if self.dialect == Dialect::Sqlite {
            let enabled = try_outcome!(self.sqlite_foreign_keys_enabled(cx).await);
            if enabled {
                try_outcome!(self.execute_raw(cx, SQLITE_FOREIGN_KEYS_OFF).await);
            }
            for table in &tables {
                try_outcome!(self.drop_table(cx, table, DropOptions::default()).await);
            }
            if enabled {
                try_outcome!(self.execute_raw(cx, SQLITE_FOREIGN_KEYS_ON).await);
            }
            return Outcome::Ok(());
        }

        let foreign_keys = try_outcome!(self.get_foreign_keys_for_tables(cx, &tables).await);
        for table in &tables {
            let Some(rows) = foreign_keys.get(&table.name) else {
                continue;
            };
            let statements: Vec<String> = constraint_names(rows)
                .iter()
                .filter_map(|name| self.generator.drop_foreign_key(table, name))
                .collect();
            try_outcome!(self.execute_all(cx, &statements).await);
        }
        let cascade = DropOptions {
            cascade: true,
            force: false,
        };
        for table in &tables {
            try_outcome!(self.drop_table(cx, table, cascade).await);
        }
        Outcome::Ok(())
    }

    async fn sqlite_foreign_keys_enabled(&self, cx: &Cx) -> Outcome<bool, Error> {
        let rows = try_outcome!(self.select_rows(cx, SQLITE_FOREIGN_KEYS, &[]).await);
        Outcome::Ok(
            rows.first()
                .and_then(|row| row.get(0))
                .and_then(Value::as_i64)
                == Some(1),
        )
    }

    /// Drop every enum type of the configured schema (Postgres only).
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn drop_all_enums(&self, cx: &Cx) -> Outcome<(), Error> {
        let schema = self
            .config
            .schema
            .as_deref()
            .unwrap_or(POSTGRES_DEFAULT_SCHEMA);
        let Some(sql) = self.generator.list_enums(schema, None) else {
            return Outcome::Ok(());
        };
        let rows = try_outcome!(self.select_rows(cx, &sql, &[]).await);
        let statements: Vec<String> = rows
            .iter()
            .filter_map(|row| text_column(row, "enum_name"))
            .filter_map(|name| self.generator.drop_enum_type(schema, &name))
            .collect();
        self.execute_all(cx, &statements).await
    }

    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn rename_table(
        &self,
        cx: &Cx,
        from: impl Into<TableRef> + std::fmt::Debug,
        to: impl Into<TableRef> + std::fmt::Debug,
    ) -> Outcome<(), Error> {
        let from = self.table(from);
        let to = self.table(to);
        let sql = self.generator.rename_table(&from, &to);
        try_outcome!(self.execute_raw(cx, &sql).await);
        tracing::info!(from = %from, to = %to, "Renamed table");
        Outcome::Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn show_all_tables(&self, cx: &Cx) -> Outcome<Vec<String>, Error> {
        let sql = self.generator.show_tables(self.config.schema.as_deref());
        let options = QueryOptions::default().tagged(QueryType::ShowTables);
        match try_outcome!(self.run(cx, &sql, &[], &options, None, None).await) {
            QueryResult::TableNames(names) => Outcome::Ok(names),
            _ => Outcome::Ok(Vec::new()),
        }
    }

    /// Columns of a table.
    ///
    /// An empty description means the table does not exist.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn describe_table(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
    ) -> Outcome<TableDescription, Error> {
        let table = self.table(table);
        let sql = self.generator.describe_table(&table);
        let options = QueryOptions::default().tagged(QueryType::Describe);
        let mut columns = match try_outcome!(self.run(cx, &sql, &[], &options, None, None).await) {
            QueryResult::Description(columns) => columns,
            _ => TableDescription::new(),
        };
        if columns.is_empty() {
            return Outcome::Err(Error::schema(
                SchemaErrorKind::TableNotFound,
                format!(
                    "No description found for \"{table}\" table. Check the table name and schema; remember, they _are_ case sensitive."
                ),
            ));
        }

        if self.dialect == Dialect::Sqlite {
            let sql = self.generator.foreign_keys(&table, None);
            let options = QueryOptions::default().tagged(QueryType::ForeignKeys);
            let rows = try_outcome!(self.run(cx, &sql, &[], &options, None, None).await).into_rows();
            apply_foreign_keys(&mut columns, &rows);
        }
        Outcome::Ok(columns)
    }

    // Columns

    #[tracing::instrument(level = "debug", skip(self, cx, attribute), fields(column = %attribute.field_name()))]
    pub async fn add_column(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        attribute: &AttributeDef,
    ) -> Outcome<(), Error> {
        let table = self.table(table);
        if self.dialect == Dialect::Postgres && attribute.data_type.is_enum() {
            try_outcome!(self.sync_enum(cx, &table, attribute).await);
        }
        let sql = self.generator.add_column(&table, attribute);
        try_outcome!(self.execute_raw(cx, &sql).await);
        tracing::info!(table = %table, column = attribute.field_name(), "Added column");
        Outcome::Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn remove_column(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        column: &str,
    ) -> Outcome<(), Error> {
        let table = self.table(table);
        match self.generator.remove_column(&table, column) {
            Some(sql) => {
                try_outcome!(self.execute_raw(cx, &sql).await);
            }
            None => {
                try_outcome!(
                    self.rebuild(cx, &table, ColumnChange::Remove(column.to_string()))
                        .await
                );
            }
        }
        tracing::info!(table = %table, column, "Removed column");
        Outcome::Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, cx, attribute), fields(column = %attribute.field_name()))]
    pub async fn change_column(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        attribute: &AttributeDef,
    ) -> Outcome<(), Error> {
        let table = self.table(table);
        if self.dialect == Dialect::Postgres && attribute.data_type.is_enum() {
            try_outcome!(self.sync_enum(cx, &table, attribute).await);
        }
        match self.generator.change_column(&table, attribute) {
            Some(statements) => {
                try_outcome!(self.execute_all(cx, &statements).await);
            }
            None => {
                try_outcome!(
                    self.rebuild(cx, &table, ColumnChange::Change(attribute.clone()))
                        .await
                );
            }
        }
        tracing::info!(table = %table, column = attribute.field_name(), "Changed column");
        Outcome::Ok(())
    }

    /// Rename a column, keeping its type, nullability and default.
    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn rename_column(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        from: &str,
        to: &str,
    ) -> Outcome<(), Error> {
        let table = self.table(table);
        let columns = try_outcome!(self.describe_table(cx, table.clone()).await);
        let Some(current) = columns.iter().find(|c| c.name == from) else {
            return Outcome::Err(Error::schema(
                SchemaErrorKind::ColumnNotFound,
                format!("Table {table} doesn't have the column {from}"),
            ));
        };

        let mut renamed = AttributeDef::new(to, DataType::Raw(current.sql_type.clone()));
        renamed.allow_null = current.allow_null;
        renamed.default_value = current.default_value.clone().map(Value::Text);

        match self.generator.rename_column(&table, from, &renamed) {
            Some(sql) => {
                try_outcome!(self.execute_raw(cx, &sql).await);
            }
            None => {
                let change = ColumnChange::Rename {
                    from: from.to_string(),
                    to: to.to_string(),
                };
                try_outcome!(self.rebuild_with(cx, &table, &columns, &change).await);
            }
        }
        tracing::info!(table = %table, from, to, "Renamed column");
        Outcome::Ok(())
    }

    async fn rebuild(&self, cx: &Cx, table: &TableRef, change: ColumnChange) -> Outcome<(), Error> {
        let columns = try_outcome!(self.describe_table(cx, table.clone()).await);
        self.rebuild_with(cx, table, &columns, &change).await
    }

    async fn rebuild_with(
        &self,
        cx: &Cx,
        table: &TableRef,
        columns: &TableDescription,
        change: &ColumnChange,
    ) -> Outcome<(), Error> {
        let foreign_keys = try_outcome!(self.sqlite_foreign_keys_enabled(cx).await);
        let statements = try_result!(rebuild_table(table, columns, change, foreign_keys));
        tracing::info!(table = %table, statements = statements.len(), "Rebuilding table");
        self.execute_all(cx, &statements).await
    }

    // Indexes and foreign keys

    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn add_index(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        index: &IndexDef,
    ) -> Outcome<(), Error> {
        let table = self.table(table);
        let sql = self.generator.add_index(&table, index);
        try_outcome!(self.execute_raw(cx, &sql).await);
        Outcome::Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn show_index(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
    ) -> Outcome<Vec<Row>, Error> {
        let table = self.table(table);
        let sql = self.generator.show_index(&table);
        let options = QueryOptions::default().tagged(QueryType::ShowIndexes);
        let result = try_outcome!(self.run(cx, &sql, &[], &options, None, None).await);
        Outcome::Ok(result.into_rows())
    }

    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn remove_index(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        name: &str,
    ) -> Outcome<(), Error> {
        let table = self.table(table);
        let sql = self.generator.remove_index(&table, name);
        try_outcome!(self.execute_raw(cx, &sql).await);
        Outcome::Ok(())
    }

    /// Foreign key rows per table name.
    #[tracing::instrument(level = "debug", skip(self, cx, tables), fields(tables = tables.len()))]
    pub async fn get_foreign_keys_for_tables(
        &self,
        cx: &Cx,
        tables: &[TableRef],
    ) -> Outcome<BTreeMap<String, Vec<Row>>, Error> {
        let mut foreign_keys = BTreeMap::new();
        let database = self.config.database.as_deref();
        for table in tables {
            let table = self.table(table);
            let sql = self.generator.foreign_keys(&table, database);
            let options = QueryOptions::default().tagged(QueryType::ForeignKeys);
            let rows = try_outcome!(self.run(cx, &sql, &[], &options, None, None).await).into_rows();
            foreign_keys.insert(table.name, rows);
        }
        Outcome::Ok(foreign_keys)
    }

    // Triggers and functions

    #[tracing::instrument(level = "debug", skip(self, cx, trigger), fields(trigger = %trigger.name))]
    pub async fn create_trigger(&self, cx: &Cx, trigger: &TriggerDef) -> Outcome<(), Error> {
        let sql = self.generator.create_trigger(trigger);
        self.execute_optional(cx, sql, "create_trigger").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn drop_trigger(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        name: &str,
    ) -> Outcome<(), Error> {
        let table = self.table(table);
        let sql = self.generator.drop_trigger(&table, name);
        self.execute_optional(cx, sql, "drop_trigger").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx))]
    pub async fn rename_trigger(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        old: &str,
        new: &str,
    ) -> Outcome<(), Error> {
        let table = self.table(table);
        let sql = self.generator.rename_trigger(&table, old, new);
        self.execute_optional(cx, sql, "rename_trigger").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx, function), fields(function = %function.name))]
    pub async fn create_function(&self, cx: &Cx, function: &FunctionDef) -> Outcome<(), Error> {
        let sql = self.generator.create_function(function);
        self.execute_optional(cx, sql, "create_function").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx, params))]
    pub async fn drop_function(
        &self,
        cx: &Cx,
        name: &str,
        params: &[FunctionParam],
    ) -> Outcome<(), Error> {
        let sql = self.generator.drop_function(name, params);
        self.execute_optional(cx, sql, "drop_function").await
    }

    #[tracing::instrument(level = "debug", skip(self, cx, params))]
    pub async fn rename_function(
        &self,
        cx: &Cx,
        old: &str,
        params: &[FunctionParam],
        new: &str,
    ) -> Outcome<(), Error> {
        let sql = self.generator.rename_function(old, params, new);
        self.execute_optional(cx, sql, "rename_function").await
    }
}
