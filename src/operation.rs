//! Operation descriptors
//!
//! Every batch entry routes through the `Operation` enum. The JSON boundary
//! discriminates on `type`:
//!
//! ```text
//! {"type": "select", "tableName": "orders", "filters": {...}, "sorts": [...]}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{QueryError, QueryResult};
use crate::filter::FilterGroup;
use crate::ir::SortDirection;

/// Operation kinds, used for dispatch, logging and transaction scoping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Select,
    Count,
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Count => "count",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Pure reads never open a transaction on their own
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Select | Self::Count)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "select" => Some(Self::Select),
            "count" => Some(Self::Count),
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All operations route through this enum
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Select(SelectOp),
    Count(CountOp),
    Insert(InsertOp),
    Update(UpdateOp),
    Delete(DeleteOp),
}

impl Operation {
    /// Parse one descriptor
    ///
    /// A missing `type` is an invalid argument; an unrecognised one is an
    /// unsupported operation.
    pub fn from_value(value: &Value) -> QueryResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| QueryError::invalid_argument("Operation must be an object"))?;

        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| QueryError::invalid_argument("Operation type is required"))?;

        let kind = OperationKind::parse(kind)
            .ok_or_else(|| QueryError::unsupported_operation(kind.to_string()))?;

        let mut normalized = obj.clone();
        normalized.insert("type".to_string(), Value::String(kind.as_str().to_string()));
        Ok(serde_json::from_value(Value::Object(normalized))?)
    }

    /// Parse a batch: an array of descriptors or a single descriptor
    pub fn parse_batch(value: &Value) -> QueryResult<Vec<Self>> {
        match value {
            Value::Array(items) => items.iter().map(Self::from_value).collect(),
            single => Ok(vec![Self::from_value(single)?]),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Select(_) => OperationKind::Select,
            Self::Count(_) => OperationKind::Count,
            Self::Insert(_) => OperationKind::Insert,
            Self::Update(_) => OperationKind::Update,
            Self::Delete(_) => OperationKind::Delete,
        }
    }

    pub fn table_name(&self) -> &str {
        match self {
            Self::Select(op) => &op.table_name,
            Self::Count(op) => &op.table_name,
            Self::Insert(op) => &op.table_name,
            Self::Update(op) => &op.table_name,
            Self::Delete(op) => &op.table_name,
        }
    }

    /// Connection named by the descriptor, if any
    pub fn connection(&self) -> Option<&str> {
        match self {
            Self::Select(op) => op.connection.as_deref(),
            Self::Count(op) => op.connection.as_deref(),
            Self::Insert(op) => op.connection.as_deref(),
            Self::Update(op) => op.connection.as_deref(),
            Self::Delete(op) => op.connection.as_deref(),
        }
    }
}

/// Sort on one attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub attribute: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Join descriptor, validated by the join compiler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSpec {
    #[serde(rename = "type", default = "default_join_kind")]
    pub kind: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub alias: Option<String>,
    /// `[left, operator, right]`
    #[serde(default)]
    pub on: Option<Vec<String>>,
    #[serde(default, alias = "leftColType")]
    pub left_col_type: Option<String>,
    #[serde(default, alias = "rightColType")]
    pub right_col_type: Option<String>,
}

fn default_join_kind() -> String {
    "inner".to_string()
}

/// Pagination request; exactly one strategy per operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Pagination {
    Offset {
        #[serde(default = "default_page")]
        page: u64,
        #[serde(default = "default_per_page")]
        per_page: u64,
    },
    Cursor {
        #[serde(default)]
        cursor: Option<String>,
        #[serde(default = "default_per_page", alias = "per_page")]
        limit: u64,
        /// Defaults to the configured primary key
        #[serde(default)]
        cursor_column: Option<String>,
    },
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    15
}

/// Read rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectOp {
    #[serde(rename = "tableName", alias = "table_name", default)]
    pub table_name: String,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub attributes: Option<Vec<String>>,
    #[serde(default)]
    pub filters: Option<FilterGroup>,
    #[serde(default)]
    pub sorts: Option<Vec<SortSpec>>,
    #[serde(default)]
    pub joins: Option<Vec<JoinSpec>>,
    #[serde(rename = "groupBy", alias = "group_by", default)]
    pub group_by: Option<Vec<String>>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
    /// Rows with a non-null value here are hidden
    #[serde(rename = "deleteColumn", alias = "delete_column", default)]
    pub delete_column: Option<String>,
}

/// Count rows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountOp {
    #[serde(rename = "tableName", alias = "table_name", default)]
    pub table_name: String,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub filters: Option<FilterGroup>,
    #[serde(default)]
    pub joins: Option<Vec<JoinSpec>>,
    #[serde(rename = "groupBy", alias = "group_by", default)]
    pub group_by: Option<Vec<String>>,
    #[serde(rename = "deleteColumn", alias = "delete_column", default)]
    pub delete_column: Option<String>,
}

/// Insert one row (object) or many (array of objects)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsertOp {
    #[serde(rename = "tableName", alias = "table_name", default)]
    pub table_name: String,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Update matching rows; `filters` is mandatory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOp {
    #[serde(rename = "tableName", alias = "table_name", default)]
    pub table_name: String,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub filters: Option<FilterGroup>,
}

/// Delete matching rows; `filters` is mandatory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteOp {
    #[serde(rename = "tableName", alias = "table_name", default)]
    pub table_name: String,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub filters: Option<FilterGroup>,
    /// When set, matching rows get this column stamped instead of removed
    #[serde(rename = "deleteColumn", alias = "delete_column", default)]
    pub delete_column: Option<String>,
}
