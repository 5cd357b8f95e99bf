//! Statement intent tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classifies a statement so its raw result can be shaped for the caller.
///
/// Exactly one tag is attached to each routed statement; the default is
/// [`QueryType::Raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    Select,
    Insert,
    Update,
    BulkUpdate,
    BulkDelete,
    Delete,
    Upsert,
    Version,
    ShowTables,
    ShowIndexes,
    Describe,
    #[default]
    Raw,
    ForeignKeys,
}

impl QueryType {
    pub const fn as_str(self) -> &'static str {
        match self {
            QueryType::Select => "SELECT",
            QueryType::Insert => "INSERT",
            QueryType::Update => "UPDATE",
            QueryType::BulkUpdate => "BULKUPDATE",
            QueryType::BulkDelete => "BULKDELETE",
            QueryType::Delete => "DELETE",
            QueryType::Upsert => "UPSERT",
            QueryType::Version => "VERSION",
            QueryType::ShowTables => "SHOWTABLES",
            QueryType::ShowIndexes => "SHOWINDEXES",
            QueryType::Describe => "DESCRIBE",
            QueryType::Raw => "RAW",
            QueryType::ForeignKeys => "FOREIGNKEYS",
        }
    }

    /// Whether statements of this kind produce a result set.
    pub const fn returns_rows(self) -> bool {
        matches!(
            self,
            QueryType::Select
                | QueryType::Version
                | QueryType::ShowTables
                | QueryType::ShowIndexes
                | QueryType::Describe
                | QueryType::ForeignKeys
        )
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_raw() {
        assert_eq!(QueryType::default(), QueryType::Raw);
    }

    #[test]
    fn serde_uses_tag_names() {
        assert_eq!(
            serde_json::to_string(&QueryType::ShowTables).unwrap(),
            "\"SHOWTABLES\""
        );
        let parsed: QueryType = serde_json::from_str("\"BULKDELETE\"").unwrap();
        assert_eq!(parsed, QueryType::BulkDelete);
        assert_eq!(QueryType::Upsert.to_string(), "UPSERT");
    }
}
