//! Scalar expressions.

use serde::{Deserialize, Serialize};

/// Target type of a cast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CastType {
    Uuid,
    Integer,
}

impl CastType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CastType::Uuid => "uuid",
            CastType::Integer => "integer",
        }
    }
}

/// A value-producing expression over one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// Plain or table-qualified column (`status`, `orders.id`, `*`)
    Column { name: String },

    /// JSON extraction over a column; the last path segment is read as text
    JsonExtract { column: String, path: Vec<String> },

    /// Caller-supplied SQL, emitted verbatim
    Raw { sql: String },

    /// Lower-cased text of the inner expression
    Lower { expr: Box<Expr> },

    /// Type cast of the inner expression
    Cast { expr: Box<Expr>, to: CastType },
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column { name: name.into() }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw { sql: sql.into() }
    }

    pub fn json(column: impl Into<String>, path: Vec<String>) -> Self {
        Expr::JsonExtract {
            column: column.into(),
            path,
        }
    }

    pub fn lower(self) -> Self {
        Expr::Lower {
            expr: Box::new(self),
        }
    }

    pub fn cast(self, to: CastType) -> Self {
        Expr::Cast {
            expr: Box::new(self),
            to,
        }
    }

    /// Physical column this expression reads, if any
    pub fn base_column(&self) -> Option<&str> {
        match self {
            Expr::Column { name } if name != "*" => Some(name),
            Expr::Column { .. } => None,
            Expr::JsonExtract { column, .. } => Some(column),
            Expr::Raw { .. } => None,
            Expr::Lower { expr } | Expr::Cast { expr, .. } => expr.base_column(),
        }
    }

    /// Returns true if the expression contains caller-supplied SQL
    pub fn is_raw(&self) -> bool {
        match self {
            Expr::Raw { .. } => true,
            Expr::Lower { expr } | Expr::Cast { expr, .. } => expr.is_raw(),
            _ => false,
        }
    }
}
