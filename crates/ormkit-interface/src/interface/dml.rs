//! Data operations: insert, upsert, update, delete, select, increment.

use super::{QueryInterface, field_values};
use crate::options::{BulkInsertOptions, QueryOptions, RawSelectOptions};
use crate::result::{QueryResult, RawResult};
use ormkit_core::{
    AttributeValues, ConfigErrorKind, Connection, Cx, DataType, Dialect, Error, Instance,
    ModelDef, Outcome, QueryType, Row, TableRef, Value, try_outcome,
};
use ormkit_query::{
    DeleteBuilder, Expr, IncrementBuilder, InsertBuilder, Select, SelectColumn, UpdateBuilder,
    UpsertBuilder,
};

/// Coerce a raw selected value to the requested type.
fn coerce(value: Value, data_type: Option<&DataType>) -> Value {
    let text = value.as_str().map(str::trim);
    match data_type {
        Some(t) if t.is_integer() => value
            .as_i64()
            .or_else(|| text.and_then(|s| s.parse().ok()))
            .map_or(value, Value::BigInt),
        Some(DataType::Float | DataType::Double | DataType::Decimal { .. }) => value
            .as_f64()
            .or_else(|| text.and_then(|s| s.parse().ok()))
            .map_or(value, Value::Double),
        _ => value,
    }
}

/// The selector of a raw select: a plain column or an expression such as
/// `count(*)`.
fn selector_column(attribute: &str) -> SelectColumn {
    let expr = if attribute.contains('(') {
        Expr::raw(attribute)
    } else {
        Expr::col(attribute)
    };
    SelectColumn::Expr { expr, alias: None }
}

impl<C: Connection> QueryInterface<C> {
    /// Model behind a statement: named in the options, then the instance's,
    /// then the one registered for the table.
    fn resolve_model(
        &self,
        options: &QueryOptions,
        instance_model: Option<&str>,
        table: &TableRef,
    ) -> Option<&ModelDef> {
        options
            .model
            .as_deref()
            .and_then(|name| self.model(name))
            .or_else(|| instance_model.and_then(|name| self.model(name)))
            .or_else(|| self.model_by_table(table))
    }

    fn wants_returning(&self, model: Option<&ModelDef>) -> bool {
        self.dialect.supports_returning() && !model.is_some_and(|m| m.options.has_trigger)
    }

    /// Insert one row.
    ///
    /// `values` is keyed by column. With an instance bound, generated
    /// columns flow back into it and it stops being a new record.
    #[tracing::instrument(level = "debug", skip(self, cx, instance, values, options))]
    pub async fn insert(
        &self,
        cx: &Cx,
        instance: Option<&mut Instance>,
        table: impl Into<TableRef> + std::fmt::Debug,
        values: &AttributeValues,
        options: &QueryOptions,
    ) -> Outcome<QueryResult, Error> {
        let table = self.table(table);
        let model = self.resolve_model(options, instance.as_deref().map(Instance::model), &table);
        let mut builder = InsertBuilder::new(table).row(values.clone());
        if instance.is_some() && self.wants_returning(model) {
            builder = builder.returning("*");
        }
        let (sql, params) = builder.build_with_dialect(self.dialect);
        let options = options.tagged(QueryType::Insert);
        self.run(cx, &sql, &params, &options, model, instance).await
    }

    /// Insert many rows in one statement; empty input sends nothing.
    #[tracing::instrument(level = "debug", skip(self, cx, rows, options), fields(rows = rows.len()))]
    pub async fn bulk_insert(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        rows: Vec<AttributeValues>,
        options: &BulkInsertOptions,
    ) -> Outcome<QueryResult, Error> {
        if rows.is_empty() {
            return Outcome::Ok(QueryResult::Affected(0));
        }
        let table = self.table(table);
        let model = self.resolve_model(&options.query, None, &table);
        let mut builder = InsertBuilder::new(table)
            .rows(rows)
            .ignore_duplicates(options.ignore_duplicates);
        if options.returning && self.dialect.supports_returning() {
            builder = builder.returning("*");
        }
        let (sql, params) = builder.build_with_dialect(self.dialect);
        let query = options.query.tagged(QueryType::Insert);
        self.run(cx, &sql, &params, &query, model, None).await
    }

    /// Insert a row or update the one it collides with.
    ///
    /// Collisions are detected on the primary key and on every unique key or
    /// unique index whose columns `insert_values` fully covers. Resolves
    /// `true` when a row was inserted.
    #[tracing::instrument(level = "debug", skip(self, cx, insert_values, update_values, model, options), fields(model = %model.name))]
    pub async fn upsert(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        insert_values: AttributeValues,
        update_values: AttributeValues,
        model: &ModelDef,
        options: &QueryOptions,
    ) -> Outcome<bool, Error> {
        let table = self.table(table);
        let keys = conflict_keys(model, &insert_values);
        let Some(conflict) = keys.first() else {
            try_outcome!(self.insert(cx, None, table, &insert_values, options).await);
            return Outcome::Ok(true);
        };

        let options = options.tagged(QueryType::Upsert);
        let existed = if self.dialect == Dialect::Sqlite {
            let probe = Select::from(table.clone())
                .column(SelectColumn::Expr {
                    expr: Expr::raw("1"),
                    alias: None,
                })
                .filter(Expr::any(keys.iter().map(|key| {
                    let subset: AttributeValues = key
                        .iter()
                        .filter_map(|f| insert_values.get(f).map(|v| (f.clone(), v.clone())))
                        .collect();
                    Expr::matching(None, &subset)
                })))
                .limit(1);
            let (sql, params) = probe.build_with_dialect(self.dialect);
            Some(!try_outcome!(self.select_rows(cx, &sql, &params).await).is_empty())
        } else {
            None
        };

        let (sql, params) = UpsertBuilder::new(table)
            .insert_values(insert_values)
            .update_values(update_values)
            .conflict_on(conflict.iter().cloned())
            .build_with_dialect(self.dialect);
        let mut raw = try_outcome!(self.fetch(cx, &sql, &params, &options, false).await);
        if let Some(existed) = existed {
            raw = RawResult {
                rows: vec![Row::from_pairs([(
                    UpsertBuilder::INSERTED_COLUMN,
                    Value::Bool(!existed),
                )])],
                ..raw
            };
        }
        match try_outcome!(self.interpret(&sql, raw, &options, Some(model), None)) {
            QueryResult::Upserted(inserted) => Outcome::Ok(inserted),
            _ => Outcome::Ok(false),
        }
    }

    /// Update rows matching `filter`; `values` is keyed by column.
    ///
    /// Empty `values` sends nothing.
    #[tracing::instrument(level = "debug", skip(self, cx, instance, values, filter, options))]
    pub async fn update(
        &self,
        cx: &Cx,
        instance: Option<&mut Instance>,
        table: impl Into<TableRef> + std::fmt::Debug,
        values: &AttributeValues,
        filter: Expr,
        options: &QueryOptions,
    ) -> Outcome<QueryResult, Error> {
        if values.is_empty() {
            tracing::warn!("Update without values; skipping");
            return Outcome::Ok(match instance {
                Some(instance) => QueryResult::Instance(instance.clone()),
                None => QueryResult::Affected(0),
            });
        }
        let table = self.table(table);
        let model = self.resolve_model(options, instance.as_deref().map(Instance::model), &table);
        let mut builder = UpdateBuilder::new(table).set_all(values).filter(filter);
        if instance.is_some() && self.wants_returning(model) {
            builder = builder.returning("*");
        }
        let (sql, params) = builder.build_with_dialect(self.dialect);
        let options = options.tagged(QueryType::Update);
        self.run(cx, &sql, &params, &options, model, instance).await
    }

    /// Update every row matching `filter`; `values` is keyed by attribute
    /// of the model registered for the table.
    #[tracing::instrument(level = "debug", skip(self, cx, values, filter, options))]
    pub async fn bulk_update(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        values: &AttributeValues,
        filter: Expr,
        options: &QueryOptions,
    ) -> Outcome<u64, Error> {
        if values.is_empty() {
            return Outcome::Ok(0);
        }
        let table = self.table(table);
        let model = self.resolve_model(options, None, &table);
        let values = match model {
            Some(model) => field_values(model, values),
            None => values.clone(),
        };
        let (sql, params) = UpdateBuilder::new(table)
            .set_all(&values)
            .filter(filter)
            .build_with_dialect(self.dialect);
        let options = options.tagged(QueryType::BulkUpdate);
        let result = try_outcome!(self.run(cx, &sql, &params, &options, model, None).await);
        Outcome::Ok(result.affected_rows())
    }

    /// Delete one row.
    ///
    /// An empty `filter` with an instance deletes the row the instance's
    /// primary key identifies.
    #[tracing::instrument(level = "debug", skip(self, cx, instance, filter, options))]
    pub async fn delete(
        &self,
        cx: &Cx,
        instance: Option<&Instance>,
        table: impl Into<TableRef> + std::fmt::Debug,
        filter: Expr,
        options: &QueryOptions,
    ) -> Outcome<u64, Error> {
        let table = self.table(table);
        let model = self.resolve_model(options, instance.map(Instance::model), &table);
        let filter = match (instance, model) {
            (Some(instance), Some(model)) if filter.is_empty_and() => {
                Expr::matching(None, &field_values(model, &instance.where_identity(model)))
            }
            _ => filter,
        };
        let (sql, params) = DeleteBuilder::new(table)
            .filter(filter)
            .limit(Some(1))
            .build_with_dialect(self.dialect);
        let options = options.tagged(QueryType::Delete);
        let result = try_outcome!(self.run(cx, &sql, &params, &options, model, None).await);
        Outcome::Ok(result.affected_rows())
    }

    /// Delete every row matching `filter`.
    #[tracing::instrument(level = "debug", skip(self, cx, filter, options))]
    pub async fn bulk_delete(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        filter: Expr,
        options: &QueryOptions,
    ) -> Outcome<u64, Error> {
        let table = self.table(table);
        let model = self.resolve_model(options, None, &table);
        let (sql, params) = DeleteBuilder::new(table)
            .filter(filter)
            .limit(None)
            .build_with_dialect(self.dialect);
        let options = options.tagged(QueryType::BulkDelete);
        let result = try_outcome!(self.run(cx, &sql, &params, &options, model, None).await);
        Outcome::Ok(result.affected_rows())
    }

    /// Run a select; with a model and without `raw` the rows come back as
    /// instances.
    #[tracing::instrument(level = "debug", skip(self, cx, model, select, options))]
    pub async fn select(
        &self,
        cx: &Cx,
        model: Option<&ModelDef>,
        select: &Select,
        options: &QueryOptions,
    ) -> Outcome<QueryResult, Error> {
        let (sql, params) = select.build_with_dialect(self.dialect);
        let options = options.tagged(QueryType::Select);
        self.run(cx, &sql, &params, &options, model, None).await
    }

    /// Add `by` (column to amount) to the matching rows, setting `extra`
    /// alongside.
    #[tracing::instrument(level = "debug", skip(self, cx, instance, by, extra, filter, options))]
    #[allow(clippy::too_many_arguments)]
    pub async fn increment(
        &self,
        cx: &Cx,
        instance: Option<&mut Instance>,
        table: impl Into<TableRef> + std::fmt::Debug,
        by: &AttributeValues,
        extra: AttributeValues,
        filter: Expr,
        options: &QueryOptions,
    ) -> Outcome<QueryResult, Error> {
        let table = self.table(table);
        let model = self.resolve_model(options, instance.as_deref().map(Instance::model), &table);
        let builder = by
            .iter()
            .fold(IncrementBuilder::new(table), |b, (column, amount)| {
                b.by(column.as_str(), amount.clone())
            })
            .extra(extra)
            .filter(filter);
        let (sql, params) = builder.build_with_dialect(self.dialect);
        let options = options.tagged(QueryType::Raw);
        self.run(cx, &sql, &params, &options, model, instance).await
    }

    /// First value of a one-column select, coerced to the requested type.
    #[tracing::instrument(level = "debug", skip(self, cx, filter, options))]
    pub async fn raw_select(
        &self,
        cx: &Cx,
        table: impl Into<TableRef> + std::fmt::Debug,
        attribute: Option<&str>,
        filter: Option<Expr>,
        options: &RawSelectOptions,
    ) -> Outcome<Option<Value>, Error> {
        let Some(attribute) = attribute else {
            return Outcome::Err(Error::config(
                ConfigErrorKind::MissingAttributeSelector,
                "Please pass an attribute selector",
            ));
        };
        let mut select = Select::from(self.table(table)).column(selector_column(attribute));
        if let Some(filter) = filter {
            select = select.filter(filter);
        }
        let (sql, params) = select.build_with_dialect(self.dialect);
        let query = options.query.clone().raw().plain().tagged(QueryType::Select);
        let row = match try_outcome!(self.run(cx, &sql, &params, &query, None, None).await) {
            QueryResult::Row(row) => row,
            other => other.into_rows().into_iter().next(),
        };
        Outcome::Ok(
            row.and_then(|row| row.into_values().into_iter().next())
                .map(|value| coerce(value, options.data_type.as_ref())),
        )
    }
}

/// Column sets an upsert can collide on, primary key first.
pub(crate) fn conflict_keys(model: &ModelDef, insert_values: &AttributeValues) -> Vec<Vec<String>> {
    let covered = |fields: &[String]| {
        !fields.is_empty() && fields.iter().all(|f| insert_values.contains_key(f))
    };
    let primary: Vec<String> = model
        .primary_key_attributes()
        .iter()
        .map(|a| model.field_for(a).to_string())
        .collect();

    let mut keys = Vec::new();
    if covered(&primary) {
        keys.push(primary);
    }
    for set in model.unique_field_sets() {
        let fields: Vec<String> = set.iter().map(|a| model.field_for(a).to_string()).collect();
        if covered(&fields) && !keys.contains(&fields) {
            keys.push(fields);
        }
    }
    keys
}
