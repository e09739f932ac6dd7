//! Result envelope
//!
//! ```json
//! {"result": [...], "sql": "...", "raw_sql": "...", "bindings": [...],
//!  "timing": {"started_at": 1718000000.1, "ended_at": 1718000000.2, "duration": 0.1},
//!  "pagination": {...}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::epoch_seconds;
use crate::render::RenderedQuery;
use crate::store::Row;

/// Wall-clock timing around the store call, in epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub started_at: f64,
    pub ended_at: f64,
    pub duration: f64,
}

impl Timing {
    pub fn between(started: DateTime<Utc>, ended: DateTime<Utc>) -> Self {
        let started_at = epoch_seconds(started);
        let ended_at = epoch_seconds(ended);
        Self {
            started_at,
            ended_at,
            duration: (ended_at - started_at).max(0.0),
        }
    }
}

/// Pagination metadata; the two shapes never share a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaginationMeta {
    Offset {
        count: u64,
        per_page: u64,
        current_page: u64,
        total_pages: u64,
        has_more: bool,
    },
    Cursor {
        count: u64,
        per_page: u64,
        has_more: bool,
        next_cursor: Option<String>,
        prev_cursor: Option<String>,
    },
}

impl PaginationMeta {
    pub fn has_more(&self) -> bool {
        match self {
            Self::Offset { has_more, .. } | Self::Cursor { has_more, .. } => *has_more,
        }
    }
}

/// Envelope returned for every executed operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Rows for reads, a summary object for writes
    pub result: Value,
    /// SQL with placeholders
    pub sql: String,
    /// SQL with bindings inlined
    pub raw_sql: String,
    pub bindings: Vec<Value>,
    pub timing: Timing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

impl OperationResult {
    /// Result rows, when the result is a row list
    pub fn rows(&self) -> Option<&Vec<Value>> {
        self.result.as_array()
    }
}

/// Builds envelopes from store output
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultFormatter;

impl ResultFormatter {
    pub fn format(
        &self,
        result: Value,
        rendered: &RenderedQuery,
        started: DateTime<Utc>,
        ended: DateTime<Utc>,
    ) -> OperationResult {
        OperationResult {
            result,
            sql: rendered.sql.clone(),
            raw_sql: rendered.raw_sql.clone(),
            bindings: rendered.bindings.clone(),
            timing: Timing::between(started, ended),
            pagination: None,
        }
    }

    pub fn format_rows(
        &self,
        rows: Vec<Row>,
        rendered: &RenderedQuery,
        started: DateTime<Utc>,
        ended: DateTime<Utc>,
    ) -> OperationResult {
        self.format(rows_to_value(rows), rendered, started, ended)
    }

    pub fn format_page(
        &self,
        rows: Vec<Row>,
        meta: PaginationMeta,
        rendered: &RenderedQuery,
        started: DateTime<Utc>,
        ended: DateTime<Utc>,
    ) -> OperationResult {
        OperationResult {
            pagination: Some(meta),
            ..self.format_rows(rows, rendered, started, ended)
        }
    }
}

pub fn rows_to_value(rows: Vec<Row>) -> Value {
    Value::Array(rows.into_iter().map(Value::Object).collect())
}
