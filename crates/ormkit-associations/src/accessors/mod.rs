//! Association accessors executed over a [`QueryInterface`].
//!
//! Every accessor is reachable two ways: directly as a method taking the
//! association id, or by name through [`AccessorSet::call`], which resolves
//! names such as `addTags` with the schema's method table.
//!
//! `set` and `add` read the current join rows first, then send their
//! updates, deletes and inserts concurrently and wait for all of them.

use crate::association::{AccessorKind, Association, AssociationId, AssociationKind, SingleKey};
use crate::belongs_to_many::BelongsToMany;
use crate::schema::Schema;
use ormkit_core::{
    AttributeValues, ConfigErrorKind, Connection, Cx, Error, Instance, ModelDef, Outcome, Row,
    Transaction, ValidationError, Value, try_outcome, try_result,
};
use ormkit_interface::{
    BoxOutcome, BulkInsertOptions, QueryInterface, QueryOptions, field_values, join_all,
};
use ormkit_query::{Expr, Join, Select, SelectColumn};


/// Default scope handling of the target model for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ScopeOption {
    /// Apply the target's default scope
    #[default]
    Default,
    /// Ignore the target's default scope
    Unscoped,
    /// Use these conditions instead of the default scope
    Custom(AttributeValues),
}

/// Per call accessor options.
///
/// Execution control lives in typed fields and is never written as row
/// data. Only [`through`](Self::through) reaches the join rows.
#[derive(Debug, Clone)]
pub struct AccessorOptions {
    pub transaction: Option<Transaction>,
    pub hooks: bool,
    pub individual_hooks: bool,
    pub ignore_duplicates: bool,
    pub validate: bool,
    /// Attribute whitelist for `create`
    pub fields: Option<Vec<String>>,
    pub logging: Option<bool>,
    /// Join row attributes applied where a target carries none of its own
    pub through: AttributeValues,
    /// Extra condition on the target rows
    pub where_: Option<Expr>,
    pub scope: ScopeOption,
    /// Join model columns returned by `get`; all when unset
    pub join_table_attributes: Option<Vec<String>>,
}

impl Default for AccessorOptions {
    fn default() -> Self {
        Self {
            transaction: None,
            hooks: true,
            individual_hooks: false,
            ignore_duplicates: false,
            validate: true,
            fields: None,
            logging: None,
            through: AttributeValues::new(),
            where_: None,
            scope: ScopeOption::Default,
            join_table_attributes: None,
        }
    }
}

impl AccessorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn transaction(mut self, transaction: Transaction) -> Self {
        self.transaction = Some(transaction);
        self
    }

    #[must_use]
    pub fn through(mut self, values: AttributeValues) -> Self {
        self.through = values;
        self
    }

    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_ = Some(expr);
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: ScopeOption) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn ignore_duplicates(mut self) -> Self {
        self.ignore_duplicates = true;
        self
    }

    #[must_use]
    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = Some(enabled);
        self
    }

    fn query(&self) -> QueryOptions {
        QueryOptions {
            transaction: self.transaction.clone(),
            logging: self.logging,
            ..QueryOptions::default()
        }
    }
}

/// A target row given to an accessor: a loaded instance or just its key.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Instance(Instance),
    Key(Value),
}

impl From<Instance> for Target {
    fn from(instance: Instance) -> Self {
        Target::Instance(instance)
    }
}

impl From<Value> for Target {
    fn from(key: Value) -> Self {
        Target::Key(key)
    }
}

impl From<i64> for Target {
    fn from(key: i64) -> Self {
        Target::Key(Value::BigInt(key))
    }
}

impl Target {
    fn key(&self, model: &ModelDef) -> Option<Value> {
        match self {
            Target::Instance(instance) => instance.primary_key(model).cloned(),
            Target::Key(key) => Some(key.clone()),
        }
    }

    /// Join row attributes the caller attached to this target.
    fn through(&self) -> Option<&AttributeValues> {
        match self {
            Target::Instance(instance) => instance.through(),
            Target::Key(_) => None,
        }
    }
}

/// Arguments of an accessor called by name.
#[derive(Debug, Clone, Default)]
pub enum AccessorArgs {
    #[default]
    None,
    Targets(Vec<Target>),
    /// Attributes of the row `create` inserts
    Values(AttributeValues),
}

/// Result of an accessor called by name.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessorOutput {
    Instances(Vec<Instance>),
    Exists(bool),
    Done,
    Removed(u64),
    Created(Instance),
}

/// A desired target resolved to its key.
struct Wanted<'t> {
    key: Value,
    through: Option<&'t AttributeValues>,
}

/// Accessors of every association in a schema.
pub struct AccessorSet<'a, C: Connection> {
    schema: &'a Schema,
    interface: &'a QueryInterface<C>,
}

impl<'a, C: Connection> AccessorSet<'a, C> {
    pub fn new(schema: &'a Schema, interface: &'a QueryInterface<C>) -> Self {
        Self { schema, interface }
    }

    fn association(&self, id: AssociationId) -> Result<&'a dyn Association, Error> {
        self.schema.association(id).ok_or_else(|| {
            Error::config(
                ConfigErrorKind::InvalidOption,
                format!("no association with id {}", id.index()),
            )
        })
    }

    fn many(&self, id: AssociationId, operation: &str) -> Result<&'a BelongsToMany, Error> {
        let assoc = self.association(id)?;
        assoc.as_belongs_to_many().ok_or_else(|| {
            Error::config(
                ConfigErrorKind::InvalidOption,
                format!(
                    "{} is only available on many-to-many associations, '{}' is {}",
                    operation,
                    assoc.alias(),
                    assoc.kind()
                ),
            )
        })
    }

    /// Key of the source row the join rows point at.
    fn source_key(&self, assoc: &BelongsToMany, source: &Instance) -> Result<Value, Error> {
        let model = self.schema.model(&assoc.source)?;
        match source.primary_key(model) {
            Some(key) if *key != Value::Null => Ok(key.clone()),
            _ => {
                let mut errors = ValidationError::new();
                errors.add_required(model.primary_key_attribute().unwrap_or("id"));
                Err(Error::Validation(errors))
            }
        }
    }

    fn keys(&self, assoc: &BelongsToMany, targets: &'_ [Target]) -> Result<Vec<Value>, Error> {
        let model = self.schema.model(&assoc.target)?;
        targets
            .iter()
            .map(|t| {
                t.key(model).ok_or_else(|| {
                    Error::config(
                        ConfigErrorKind::InvalidOption,
                        format!("{} target has no primary key value", model.name),
                    )
                })
            })
            .collect()
    }

    fn wanted<'t>(&self, assoc: &BelongsToMany, targets: &'t [Target]) -> Result<Vec<Wanted<'t>>, Error> {
        let keys = self.keys(assoc, targets)?;
        Ok(keys
            .into_iter()
            .zip(targets)
            .map(|(key, target)| Wanted {
                key,
                through: target.through(),
            })
            .collect())
    }

    /// Conditions on the target rows: the association scope, the per call
    /// filter and the default scope unless replaced or switched off.
    fn target_filter(
        &self,
        scope: Option<&AttributeValues>,
        target: &ModelDef,
        alias: &str,
        options: &AccessorOptions,
    ) -> Expr {
        let default_scope = match &options.scope {
            ScopeOption::Default => target.options.default_scope.as_ref(),
            ScopeOption::Unscoped => None,
            ScopeOption::Custom(values) => Some(values),
        };
        let mut parts = Vec::new();
        if let Some(scope) = scope {
            parts.push(Expr::matching(Some(alias), &field_values(target, scope)));
        }
        if let Some(extra) = &options.where_ {
            parts.push(extra.clone());
        }
        if let Some(values) = default_scope {
            parts.push(Expr::matching(Some(alias), &field_values(target, values)));
        }
        Expr::all(parts)
    }

    fn through_scope(&self, assoc: &BelongsToMany, through: &ModelDef, alias: Option<&str>) -> Expr {
        match &assoc.through_scope {
            Some(scope) => Expr::matching(alias, &field_values(through, scope)),
            None => Expr::all([]),
        }
    }

    /// Target rows joined to the source's join rows.
    fn many_select(
        &self,
        assoc: &BelongsToMany,
        source_key: Value,
        options: &AccessorOptions,
        extra: Option<Expr>,
    ) -> Result<(Select, String), Error> {
        let target = self.schema.model(&assoc.target)?;
        let through = self.schema.model(&assoc.through_model)?;
        let target_alias = target.name.as_str();
        let through_alias = through.name.as_str();
        let target_pk = target
            .primary_key_def()
            .map_or("id", |pk| pk.field_name());

        let mut select = Select::from(target.table_ref())
            .alias(target_alias)
            .column(SelectColumn::All(Some(target_alias.to_string())));
        for attribute in through.attributes.iter() {
            let wanted = options
                .join_table_attributes
                .as_ref()
                .is_none_or(|names| names.iter().any(|n| *n == attribute.name));
            if wanted {
                let field = attribute.field_name();
                select = select.column(SelectColumn::Expr {
                    expr: Expr::qualified(through_alias, field),
                    alias: Some(format!("{through_alias}.{field}")),
                });
            }
        }
        let on = Expr::qualified(through_alias, assoc.foreign_identifier_field())
            .eq(Expr::qualified(target_alias, target_pk));
        let mut filter = vec![
            Expr::qualified(through_alias, assoc.identifier_field()).eq(source_key),
            self.through_scope(assoc, through, Some(through_alias)),
            self.target_filter(assoc.scope.as_ref(), target, target_alias, options),
        ];
        filter.extend(extra);
        select = select
            .join(Join::inner(through.table_ref(), on).alias(through_alias))
            .filter(Expr::all(filter));
        Ok((select, format!("{through_alias}.")))
    }

    /// Target rows of a single key association.
    fn single_select(
        &self,
        assoc: &SingleKey,
        source: &Instance,
        options: &AccessorOptions,
    ) -> Result<Option<Select>, Error> {
        let target = self.schema.model(assoc.target())?;
        let source_model = self.schema.model(assoc.source())?;
        let alias = target.name.as_str();
        let condition = match assoc.kind() {
            AssociationKind::BelongsTo => match source.get(assoc.foreign_key()) {
                None | Some(Value::Null) => return Ok(None),
                Some(key) => {
                    Expr::qualified(alias, target.field_for(assoc.referenced_key())).eq(key.clone())
                }
            },
            _ => match source.primary_key(source_model) {
                None | Some(Value::Null) => return Ok(None),
                Some(key) => Expr::qualified(alias, assoc.foreign_key_field()).eq(key.clone()),
            },
        };
        let mut select = Select::from(target.table_ref()).alias(alias).filter(Expr::all([
            condition,
            self.target_filter(assoc.scope(), target, alias, options),
        ]));
        if assoc.kind() != AssociationKind::HasMany {
            select = select.limit(1);
        }
        Ok(Some(select))
    }

    /// Read the current join rows of `source_key`, optionally only those
    /// pointing at `keys`.
    async fn join_rows(
        &self,
        cx: &Cx,
        assoc: &BelongsToMany,
        source_key: &Value,
        keys: Option<&[Value]>,
        options: &AccessorOptions,
    ) -> Outcome<Vec<Row>, Error> {
        let through = try_result!(self.schema.model(&assoc.through_model));
        let mut filter = vec![
            Expr::col(assoc.identifier_field()).eq(source_key.clone()),
            self.through_scope(assoc, through, None),
        ];
        if let Some(keys) = keys {
            filter.push(Expr::col(assoc.foreign_identifier_field()).in_list(keys.iter().cloned()));
        }
        let select = Select::from(through.table_ref()).filter(Expr::all(filter));
        let result = try_outcome!(
            self.interface
                .select(cx, None, &select, &options.query().raw())
                .await
        );
        Outcome::Ok(result.into_rows())
    }

    /// Targets of the association for `source`.
    ///
    /// Many-to-many results carry the matching join row in
    /// [`Instance::through`], keyed by column.
    #[tracing::instrument(level = "debug", skip(self, cx, source, options))]
    pub async fn get(
        &self,
        cx: &Cx,
        id: AssociationId,
        source: &Instance,
        options: &AccessorOptions,
    ) -> Outcome<Vec<Instance>, Error> {
        let assoc = try_result!(self.association(id));
        let target = try_result!(self.schema.model(assoc.target()));

        let (select, query) = if let Some(many) = assoc.as_belongs_to_many() {
            let source_key = try_result!(self.source_key(many, source));
            let (select, prefix) = try_result!(self.many_select(many, source_key, options, None));
            (select, options.query().through_prefix(prefix))
        } else if let Some(single) = assoc.as_single_key() {
            match try_result!(self.single_select(single, source, options)) {
                Some(select) => (select, options.query()),
                None => return Outcome::Ok(Vec::new()),
            }
        } else {
            return Outcome::Err(Error::config(
                ConfigErrorKind::InvalidOption,
                format!("association '{}' cannot be read", assoc.alias()),
            ));
        };

        let result = try_outcome!(self.interface.select(cx, Some(target), &select, &query).await);
        Outcome::Ok(result.into_instances())
    }

    /// True when every given target is currently associated.
    ///
    /// The target's default scope is not applied.
    #[tracing::instrument(level = "debug", skip(self, cx, source, targets, options), fields(targets = targets.len()))]
    pub async fn has(
        &self,
        cx: &Cx,
        id: AssociationId,
        source: &Instance,
        targets: &[Target],
        options: &AccessorOptions,
    ) -> Outcome<bool, Error> {
        if targets.is_empty() {
            return Outcome::Ok(true);
        }
        let assoc = try_result!(self.many(id, "has"));
        let target = try_result!(self.schema.model(&assoc.target));
        let source_key = try_result!(self.source_key(assoc, source));
        let alias = target.name.as_str();
        let pk = target.primary_key_def().map_or("id", |pk| pk.field_name());

        let mut matches = Vec::with_capacity(targets.len());
        for t in targets {
            let condition = match t {
                Target::Instance(instance) => {
                    let identity = instance.where_identity(target);
                    if identity.is_empty() {
                        return Outcome::Err(Error::config(
                            ConfigErrorKind::InvalidOption,
                            format!("{} target has no primary key value", target.name),
                        ));
                    }
                    Expr::matching(Some(alias), &field_values(target, &identity))
                }
                Target::Key(key) => Expr::qualified(alias, pk).eq(key.clone()),
            };
            matches.push(condition);
        }

        let mut options = options.clone();
        options.scope = ScopeOption::Unscoped;
        let (select, _) = try_result!(self.many_select(assoc, source_key, &options, Some(Expr::any(matches))));
        let rows = try_outcome!(
            self.interface
                .select(cx, Some(target), &select, &options.query().raw())
                .await
        )
        .into_rows();
        Outcome::Ok(rows.len() == targets.len())
    }

    /// Make `targets` exactly the associated rows. `None` clears them.
    ///
    /// Join rows kept from before are updated when the caller's through
    /// attributes differ from the stored ones, rows no longer wanted are deleted in one statement and
    /// the new ones inserted in one statement.
    #[tracing::instrument(level = "debug", skip(self, cx, source, targets, options))]
    pub async fn set(
        &self,
        cx: &Cx,
        id: AssociationId,
        source: &Instance,
        targets: Option<&[Target]>,
        options: &AccessorOptions,
    ) -> Outcome<(), Error> {
        let assoc = try_result!(self.many(id, "set"));
        let through = try_result!(self.schema.model(&assoc.through_model));
        let source_key = try_result!(self.source_key(assoc, source));
        let wanted = try_result!(self.wanted(assoc, targets.unwrap_or_default()));

        let current = try_outcome!(self.join_rows(cx, assoc, &source_key, None, options).await);
        let field = assoc.foreign_identifier_field();

        let obsolete: Vec<Value> = current
            .iter()
            .filter_map(|row| row.get_by_name(field))
            .filter(|stored| !wanted.iter().any(|w| w.key.same_key(stored)))
            .cloned()
            .collect();

        let mut updates = Vec::new();
        let mut inserts = Vec::new();
        for w in &wanted {
            let stored = current
                .iter()
                .find(|row| row.get_by_name(field).is_some_and(|v| v.same_key(&w.key)));
            match stored {
                None => inserts.push(w),
                Some(row) => {
                    let values = through_values(w.through, &options.through);
                    if let Some(values) = changed_through(through, assoc, row, values) {
                        updates.push((w.key.clone(), values));
                    }
                }
            }
        }

        tracing::trace!(
            current = current.len(),
            obsolete = obsolete.len(),
            updates = updates.len(),
            inserts = inserts.len(),
            "Reconciling join rows"
        );
        self.write(cx, assoc, &source_key, updates, obsolete, &inserts, options)
            .await
    }

    /// Associate `targets` without touching other join rows.
    ///
    /// Rows already present are updated only when the through attributes
    /// differ from the stored ones. `None` does nothing.
    #[tracing::instrument(level = "debug", skip(self, cx, source, targets, options))]
    pub async fn add(
        &self,
        cx: &Cx,
        id: AssociationId,
        source: &Instance,
        targets: Option<&[Target]>,
        options: &AccessorOptions,
    ) -> Outcome<(), Error> {
        let targets = match targets {
            Some(targets) if !targets.is_empty() => targets,
            _ => return Outcome::Ok(()),
        };
        let assoc = try_result!(self.many(id, "add"));
        let through = try_result!(self.schema.model(&assoc.through_model));
        let source_key = try_result!(self.source_key(assoc, source));
        let wanted = try_result!(self.wanted(assoc, targets));
        let keys: Vec<Value> = wanted.iter().map(|w| w.key.clone()).collect();

        let current = try_outcome!(
            self.join_rows(cx, assoc, &source_key, Some(&keys), options)
                .await
        );
        let field = assoc.foreign_identifier_field();

        let mut updates = Vec::new();
        let mut inserts = Vec::new();
        for w in &wanted {
            let stored = current
                .iter()
                .find(|row| row.get_by_name(field).is_some_and(|v| v.same_key(&w.key)));
            match stored {
                None => inserts.push(w),
                Some(row) => {
                    let values = through_values(w.through, &options.through);
                    if let Some(values) = changed_through(through, assoc, row, values) {
                        updates.push((w.key.clone(), values));
                    }
                }
            }
        }

        tracing::trace!(
            current = current.len(),
            updates = updates.len(),
            inserts = inserts.len(),
            "Adding join rows"
        );
        self.write(cx, assoc, &source_key, updates, Vec::new(), &inserts, options)
            .await
    }

    /// Send the update, delete and insert batches concurrently.
    #[allow(clippy::too_many_arguments)]
    async fn write(
        &self,
        cx: &Cx,
        assoc: &BelongsToMany,
        source_key: &Value,
        updates: Vec<(Value, AttributeValues)>,
        obsolete: Vec<Value>,
        inserts: &[&Wanted<'_>],
        options: &AccessorOptions,
    ) -> Outcome<(), Error> {
        let through = try_result!(self.schema.model(&assoc.through_model));
        let interface = self.interface;
        let query = options.query().model(through.name.clone());
        let mut batch: Vec<BoxOutcome<'_, u64>> = Vec::new();

        for (key, values) in updates {
            let filter = Expr::col(assoc.identifier_field())
                .eq(source_key.clone())
                .and(Expr::col(assoc.foreign_identifier_field()).eq(key));
            let table = through.table_ref();
            let query = query.clone();
            batch.push(Box::pin(async move {
                interface.bulk_update(cx, table, &values, filter, &query).await
            }));
        }

        if !obsolete.is_empty() {
            let filter = Expr::col(assoc.identifier_field())
                .eq(source_key.clone())
                .and(Expr::col(assoc.foreign_identifier_field()).in_list(obsolete));
            let table = through.table_ref();
            let query = query.clone();
            batch.push(Box::pin(async move {
                interface.bulk_delete(cx, table, filter, &query).await
            }));
        }

        if !inserts.is_empty() {
            let rows: Vec<AttributeValues> = inserts
                .iter()
                .map(|w| {
                    let mut values = through_values(w.through, &options.through);
                    if let Some(scope) = &assoc.through_scope {
                        values.extend(scope.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                    values.insert(assoc.identifier.clone(), source_key.clone());
                    values.insert(assoc.foreign_identifier.clone(), w.key.clone());
                    field_values(through, &values)
                })
                .collect();
            let table = through.table_ref();
            let insert_options = BulkInsertOptions {
                ignore_duplicates: options.ignore_duplicates,
                returning: false,
                query: query.clone(),
            };
            batch.push(Box::pin(async move {
                let result = try_outcome!(interface.bulk_insert(cx, table, rows, &insert_options).await);
                Outcome::Ok(result.affected_rows())
            }));
        }

        try_outcome!(join_all(batch).await);
        Outcome::Ok(())
    }

    /// Delete the join rows between `source` and `targets`.
    #[tracing::instrument(level = "debug", skip(self, cx, source, targets, options), fields(targets = targets.len()))]
    pub async fn remove(
        &self,
        cx: &Cx,
        id: AssociationId,
        source: &Instance,
        targets: &[Target],
        options: &AccessorOptions,
    ) -> Outcome<u64, Error> {
        if targets.is_empty() {
            return Outcome::Ok(0);
        }
        let assoc = try_result!(self.many(id, "remove"));
        let through = try_result!(self.schema.model(&assoc.through_model));
        let source_key = try_result!(self.source_key(assoc, source));
        let keys = try_result!(self.keys(assoc, targets));

        let filter = Expr::col(assoc.identifier_field())
            .eq(source_key)
            .and(Expr::col(assoc.foreign_identifier_field()).in_list(keys));
        let query = options.query().model(through.name.clone());
        self.interface
            .bulk_delete(cx, through.table_ref(), filter, &query)
            .await
    }

    /// Insert a target row and associate it with `source`.
    ///
    /// The association scope is written into the new row and added to the
    /// field whitelist. Through attributes come from `options.through`.
    #[tracing::instrument(level = "debug", skip(self, cx, source, values, options))]
    pub async fn create(
        &self,
        cx: &Cx,
        id: AssociationId,
        source: &Instance,
        values: AttributeValues,
        options: &AccessorOptions,
    ) -> Outcome<Instance, Error> {
        let assoc = try_result!(self.many(id, "create"));
        let target = try_result!(self.schema.model(&assoc.target));
        try_result!(self.source_key(assoc, source));

        let mut values = values;
        let mut fields = options.fields.clone();
        if let Some(scope) = &assoc.scope {
            for (name, value) in scope {
                values.insert(name.clone(), value.clone());
                if let Some(fields) = fields.as_mut() {
                    if !fields.contains(name) {
                        fields.push(name.clone());
                    }
                }
            }
        }
        if let Some(fields) = &fields {
            values.retain(|name, _| fields.contains(name));
        }

        let mut instance = Instance::new(target.name.clone());
        for (name, value) in &values {
            instance.set(name.clone(), value.clone());
        }
        let query = options.query().model(target.name.clone());
        try_outcome!(
            self.interface
                .insert(cx, Some(&mut instance), target.table_ref(), &field_values(target, &values), &query)
                .await
        );

        let mut add_options = options.clone();
        add_options.fields = None;
        let link = [Target::Instance(instance.clone())];
        try_outcome!(self.add(cx, id, source, Some(&link), &add_options).await);
        Outcome::Ok(instance)
    }

    /// Call an accessor by name, e.g. `getTags` or `addTag`.
    pub async fn call(
        &self,
        cx: &Cx,
        source: &Instance,
        accessor: &str,
        args: AccessorArgs,
        options: &AccessorOptions,
    ) -> Outcome<AccessorOutput, Error> {
        let Some((id, kind)) = self.schema.dispatch(source.model(), accessor) else {
            return Outcome::Err(Error::config(
                ConfigErrorKind::InvalidOption,
                format!("{} has no accessor named {}", source.model(), accessor),
            ));
        };
        let targets = match &args {
            AccessorArgs::Targets(targets) => Some(targets.as_slice()),
            _ => None,
        };
        let output = match kind {
            AccessorKind::Get => {
                AccessorOutput::Instances(try_outcome!(self.get(cx, id, source, options).await))
            }
            AccessorKind::HasSingle | AccessorKind::HasAll => AccessorOutput::Exists(try_outcome!(
                self.has(cx, id, source, targets.unwrap_or_default(), options)
                    .await
            )),
            AccessorKind::Set => {
                try_outcome!(self.set(cx, id, source, targets, options).await);
                AccessorOutput::Done
            }
            AccessorKind::Add | AccessorKind::AddMultiple => {
                try_outcome!(self.add(cx, id, source, targets, options).await);
                AccessorOutput::Done
            }
            AccessorKind::Remove | AccessorKind::RemoveMultiple => AccessorOutput::Removed(try_outcome!(
                self.remove(cx, id, source, targets.unwrap_or_default(), options)
                    .await
            )),
            AccessorKind::Create => {
                let AccessorArgs::Values(values) = args else {
                    return Outcome::Err(Error::config(
                        ConfigErrorKind::InvalidOption,
                        format!("{accessor} expects attribute values"),
                    ));
                };
                AccessorOutput::Created(try_outcome!(self.create(cx, id, source, values, options).await))
            }
        };
        Outcome::Ok(output)
    }
}

/// A target's own through attributes, completed by the caller defaults.
fn through_values(explicit: Option<&AttributeValues>, defaults: &AttributeValues) -> AttributeValues {
    let mut values = defaults.clone();
    if let Some(explicit) = explicit {
        values.extend(explicit.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    values
}

/// Values to write to an existing join row.
///
/// The key columns are never rewritten. Targets loaded by `get` carry their
/// whole join row, so `None` unless some other value differs from `row`.
fn changed_through(
    through: &ModelDef,
    assoc: &BelongsToMany,
    row: &Row,
    values: AttributeValues,
) -> Option<AttributeValues> {
    let keys = [assoc.identifier_field(), assoc.foreign_identifier_field()];
    let values: AttributeValues = values
        .into_iter()
        .filter(|(name, _)| !keys.contains(&through.field_for(name)))
        .collect();
    let changed = field_values(through, &values).iter().any(|(column, value)| {
        row.get_by_name(column)
            .is_none_or(|stored| !(stored == value || stored.same_key(value)))
    });
    changed.then_some(values)
}
