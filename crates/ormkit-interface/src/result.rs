//! Raw driver output and its shaping per [`QueryType`].

use crate::options::QueryOptions;
use ormkit_core::{
    AttributeValues, DatabaseError, DatabaseErrorKind, Error, Instance, ModelDef, QueryType,
    Result, Row, Value,
};
use ormkit_query::UpsertBuilder;
use ormkit_schema::{TableDescription, describe_rows};

/// What the driver handed back for one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
    pub insert_id: Option<i64>,
}

impl RawResult {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Self::default()
        }
    }

    pub fn inserted(insert_id: i64) -> Self {
        Self {
            rows_affected: 1,
            insert_id: Some(insert_id),
            ..Self::default()
        }
    }
}

/// A statement's result in the shape its intent calls for.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// The bound instance, updated from the driver output
    Instance(Instance),
    Instances(Vec<Instance>),
    Rows(Vec<Row>),
    /// First row of a plain select
    Row(Option<Row>),
    TableNames(Vec<String>),
    Description(TableDescription),
    Version(String),
    /// Rows plus driver metadata for untagged statements
    Raw { rows: Vec<Row>, rows_affected: u64 },
    Affected(u64),
    /// `true` when an upsert inserted, `false` when it updated
    Upserted(bool),
}

impl QueryResult {
    pub fn into_instances(self) -> Vec<Instance> {
        match self {
            QueryResult::Instances(instances) => instances,
            QueryResult::Instance(instance) => vec![instance],
            _ => Vec::new(),
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryResult::Rows(rows) | QueryResult::Raw { rows, .. } => rows,
            QueryResult::Row(row) => row.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn affected_rows(&self) -> u64 {
        match self {
            QueryResult::Affected(n) | QueryResult::Raw { rows_affected: n, .. } => *n,
            QueryResult::Instance(_) => 1,
            _ => 0,
        }
    }
}

/// Shapes raw driver output by the statement's [`QueryType`].
///
/// The interpreter never talks to the database; it only looks at the raw
/// result, the options the statement was routed with and the bound
/// instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultInterpreter;

impl ResultInterpreter {
    pub fn interpret(
        self,
        raw: RawResult,
        options: &QueryOptions,
        model: Option<&ModelDef>,
        instance: Option<&mut Instance>,
    ) -> Result<QueryResult> {
        match options.query_type {
            QueryType::Insert | QueryType::Update => {
                Ok(Self::write_result(raw, options.query_type, model, instance))
            }
            QueryType::Select => Ok(Self::select_result(raw.rows, options, model)),
            QueryType::ShowTables => Ok(QueryResult::TableNames(first_column_text(&raw.rows))),
            QueryType::ShowIndexes | QueryType::ForeignKeys => Ok(QueryResult::Rows(raw.rows)),
            QueryType::Describe => Ok(QueryResult::Description(describe_rows(&raw.rows))),
            QueryType::Version => version_string(&raw.rows).map(QueryResult::Version),
            QueryType::BulkUpdate | QueryType::BulkDelete | QueryType::Delete => {
                Ok(QueryResult::Affected(raw.rows_affected))
            }
            QueryType::Upsert => Ok(QueryResult::Upserted(upsert_inserted(&raw))),
            QueryType::Raw => Ok(match instance {
                Some(instance) => QueryResult::Instance(instance.clone()),
                None => QueryResult::Raw {
                    rows: raw.rows,
                    rows_affected: raw.rows_affected,
                },
            }),
        }
    }

    fn write_result(
        raw: RawResult,
        query_type: QueryType,
        model: Option<&ModelDef>,
        instance: Option<&mut Instance>,
    ) -> QueryResult {
        let Some(instance) = instance else {
            return if raw.rows.is_empty() {
                QueryResult::Affected(raw.rows_affected)
            } else {
                QueryResult::Rows(raw.rows)
            };
        };

        if let Some(row) = raw.rows.first() {
            // RETURNING output is authoritative for generated columns
            for (column, value) in row.iter() {
                let name = model
                    .and_then(|m| m.attributes.by_field(column))
                    .map_or(column, |a| a.name.as_str());
                instance.set(name, value.clone());
            }
        } else if query_type == QueryType::Insert {
            if let (Some(id), Some(field)) =
                (raw.insert_id, model.and_then(ModelDef::auto_increment_field))
            {
                let name = model
                    .and_then(|m| m.attributes.by_field(field))
                    .map_or(field, |a| a.name.as_str())
                    .to_string();
                let missing = instance.get(&name).is_none_or(|v| *v == Value::Null);
                if missing {
                    instance.set(name, Value::BigInt(id));
                }
            }
        }
        instance.mark_persisted();
        QueryResult::Instance(instance.clone())
    }

    fn select_result(rows: Vec<Row>, options: &QueryOptions, model: Option<&ModelDef>) -> QueryResult {
        let model = match model {
            Some(model) if !options.raw => model,
            _ => {
                return if options.plain {
                    QueryResult::Row(rows.into_iter().next())
                } else {
                    QueryResult::Rows(rows)
                };
            }
        };

        let take = if options.plain { 1 } else { rows.len() };
        let instances = rows
            .iter()
            .take(take)
            .map(|row| hydrate(model, row, options.through_prefix.as_deref()))
            .collect();
        QueryResult::Instances(instances)
    }
}

/// Build an instance, folding `prefix`ed columns into its through values.
fn hydrate(model: &ModelDef, row: &Row, through_prefix: Option<&str>) -> Instance {
    let Some(prefix) = through_prefix else {
        return Instance::from_row(model, row);
    };

    let mut own = Vec::new();
    let mut through = AttributeValues::new();
    for (column, value) in row.iter() {
        match column.strip_prefix(prefix) {
            Some(name) => {
                through.insert(name.to_string(), value.clone());
            }
            None => own.push((column.to_string(), value.clone())),
        }
    }
    let mut instance = Instance::from_row(model, &Row::from_pairs(own));
    if !through.is_empty() {
        instance.set_through(Some(through));
    }
    instance
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) => Some(s.clone()),
        other => other
            .as_i64()
            .map(|n| n.to_string())
            .or_else(|| other.as_f64().map(|f| f.to_string()))
            .or_else(|| other.as_str().map(str::to_string)),
    }
}

fn first_column_text(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get(0).and_then(value_text))
        .collect()
}

fn column_ci<'a>(row: &'a Row, name: &str) -> Option<&'a Value> {
    row.iter()
        .find(|(column, _)| column.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// Version text from either a single `version` column or product rows.
fn version_string(rows: &[Row]) -> Result<String> {
    let product_rows: Vec<&Row> = rows
        .iter()
        .filter(|row| column_ci(row, "product").is_some())
        .collect();

    if !product_rows.is_empty() {
        let row = product_rows
            .iter()
            .find(|row| {
                column_ci(row, "product")
                    .and_then(Value::as_str)
                    .is_some_and(|p| p.contains("Database"))
            })
            .unwrap_or(&product_rows[0]);
        let field = |name: &str| column_ci(row, name).and_then(value_text).unwrap_or_default();
        return Ok(format!(
            "PRODUCT={}, VERSION={}, STATUS={}",
            field("product"),
            field("version"),
            field("status")
        ));
    }

    rows.first()
        .and_then(|row| {
            column_ci(row, "version")
                .or_else(|| row.get(0))
                .and_then(value_text)
        })
        .ok_or_else(|| {
            Error::Database(DatabaseError::new(
                DatabaseErrorKind::NotFound,
                "the database did not report a version",
            ))
        })
}

fn upsert_inserted(raw: &RawResult) -> bool {
    let flag = raw
        .rows
        .first()
        .and_then(|row| row.get_by_name(UpsertBuilder::INSERTED_COLUMN));
    match flag {
        Some(value) => value.as_bool().unwrap_or(false),
        // MySQL reports 1 for an insert and 2 for an update
        None => raw.rows_affected == 1,
    }
}
