//! Database row representation.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Column metadata shared across all rows in a result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnInfo {
    names: Vec<String>,
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single row returned from a database query.
///
/// Rows provide both index-based and name-based access to column values.
/// Rows from one result set share their column metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a row with its own column metadata.
    ///
    /// Drivers building many rows should prefer [`Row::with_columns`].
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            values,
            columns: Arc::new(ColumnInfo::new(column_names)),
        }
    }

    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Build a row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (names, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(names, values)
    }

    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.index_of(name).is_some()
    }

    /// Get a typed value by column name.
    pub fn get_named<T>(&self, name: &str) -> Result<T>
    where
        T: TryFrom<Value, Error = Error>,
    {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::Type(TypeError {
                expected: "column",
                actual: "missing".to_string(),
                column: Some(name.to_string()),
            })
        })?;
        T::try_from(value.clone()).map_err(|err| match err {
            Error::Type(mut te) => {
                te.column = Some(name.to_string());
                Error::Type(te)
            }
            other => other,
        })
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Iterate `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.column_names().zip(self.values.iter())
    }

    /// Copy the row into an ordered name to value map.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_column_info() {
        let columns = Arc::new(ColumnInfo::new(vec!["id".into(), "name".into()]));
        let a = Row::with_columns(Arc::clone(&columns), vec![Value::Int(1), "a".into()]);
        let b = Row::with_columns(Arc::clone(&columns), vec![Value::Int(2), "b".into()]);
        assert!(Arc::ptr_eq(&a.column_info(), &b.column_info()));
        assert_eq!(b.get_by_name("name"), Some(&Value::Text("b".into())));
    }

    #[test]
    fn get_named_reports_column_on_failure() {
        let row = Row::from_pairs([("count", Value::Bytes(vec![0]))]);
        match row.get_named::<i64>("count") {
            Err(Error::Type(te)) => assert_eq!(te.column.as_deref(), Some("count")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(row.get_named::<i64>("missing").is_err());
    }

    #[test]
    fn to_map_preserves_all_columns() {
        let row = Row::from_pairs([("a", 1_i64), ("b", 2_i64)]);
        let map = row.to_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["b"], Value::BigInt(2));
    }

    #[test]
    fn rows_compare_by_columns_and_values() {
        let row = Row::from_pairs([("a", 1_i64), ("b", 2_i64)]);
        assert_eq!(row, Row::from_pairs([("a", 1_i64), ("b", 2_i64)]));
        assert_ne!(row, Row::from_pairs([("a", 1_i64), ("c", 2_i64)]));
        assert_ne!(row, Row::from_pairs([("a", 1_i64), ("b", 3_i64)]));
    }
}
