//! Per call options for routed statements.

use ormkit_core::{DataType, QueryType, Transaction};

/// Execution options attached to one routed statement.
///
/// The router fills [`query_type`](Self::query_type) itself; callers set
/// the rest.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub query_type: QueryType,
    /// Return rows as read instead of hydrated instances
    pub raw: bool,
    /// Only the first row is wanted
    pub plain: bool,
    /// Per statement override of the configured logging switch
    pub logging: Option<bool>,
    pub transaction: Option<Transaction>,
    /// Name of the model results are hydrated into
    pub model: Option<String>,
    /// Column prefix (`Alias.`) of join table values folded into each
    /// instance's through attributes
    pub through_prefix: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    #[must_use]
    pub fn plain(mut self) -> Self {
        self.plain = true;
        self
    }

    #[must_use]
    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = Some(enabled);
        self
    }

    #[must_use]
    pub fn transaction(mut self, transaction: Option<Transaction>) -> Self {
        self.transaction = transaction;
        self
    }

    #[must_use]
    pub fn through_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.through_prefix = Some(prefix.into());
        self
    }

    /// Hydrate results into the named model.
    #[must_use]
    pub fn model(mut self, name: impl Into<String>) -> Self {
        self.model = Some(name.into());
        self
    }

    /// Copy tagged for routing.
    pub(crate) fn tagged(&self, query_type: QueryType) -> Self {
        let mut options = self.clone();
        options.query_type = query_type;
        options
    }
}

/// Options for [`QueryInterface::drop_table`](crate::QueryInterface::drop_table).
#[derive(Debug, Clone, Copy, Default)]
pub struct DropOptions {
    pub cascade: bool,
    /// Alias of `cascade`
    pub force: bool,
}

impl DropOptions {
    pub const fn cascading(self) -> bool {
        self.cascade || self.force
    }
}

/// Options for [`QueryInterface::bulk_insert`](crate::QueryInterface::bulk_insert).
#[derive(Debug, Clone, Default)]
pub struct BulkInsertOptions {
    pub ignore_duplicates: bool,
    /// Read back the inserted rows where the dialect allows it
    pub returning: bool,
    pub query: QueryOptions,
}

/// Options for [`QueryInterface::raw_select`](crate::QueryInterface::raw_select).
#[derive(Debug, Clone, Default)]
pub struct RawSelectOptions {
    /// Coerce the selected value to this type
    pub data_type: Option<DataType>,
    pub query: QueryOptions,
}
