//! Boolean predicate trees.
//!
//! Groups are kept as nested `And` / `Or` nodes exactly as they were written,
//! so precedence never depends on operator binding rules.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::expr::Expr;

/// Binary comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl CompareOp {
    /// SQL spelling of the operator
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
        }
    }

    /// Parse an SQL comparison operator (`=`, `!=`, `<>`, `<`, `>`, `<=`, `>=`)
    pub fn from_sql(op: &str) -> Option<Self> {
        match op.trim() {
            "=" => Some(CompareOp::Eq),
            "<>" | "!=" => Some(CompareOp::NotEq),
            ">" => Some(CompareOp::Gt),
            "<" => Some(CompareOp::Lt),
            ">=" => Some(CompareOp::Gte),
            "<=" => Some(CompareOp::Lte),
            _ => None,
        }
    }
}

/// A compiled boolean predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    Compare {
        expr: Expr,
        op: CompareOp,
        value: Value,
    },
    Like {
        expr: Expr,
        pattern: String,
        negated: bool,
    },
    InList {
        expr: Expr,
        values: Vec<Value>,
        negated: bool,
    },
    IsNull {
        expr: Expr,
        negated: bool,
    },
    And {
        predicates: Vec<Predicate>,
    },
    Or {
        predicates: Vec<Predicate>,
    },
}

impl Predicate {
    pub fn compare(expr: Expr, op: CompareOp, value: Value) -> Self {
        Predicate::Compare { expr, op, value }
    }

    pub fn is_null(expr: Expr) -> Self {
        Predicate::IsNull {
            expr,
            negated: false,
        }
    }

    pub fn is_not_null(expr: Expr) -> Self {
        Predicate::IsNull {
            expr,
            negated: true,
        }
    }

    pub fn and(predicates: Vec<Predicate>) -> Self {
        Predicate::And { predicates }
    }

    pub fn or(predicates: Vec<Predicate>) -> Self {
        Predicate::Or { predicates }
    }

    /// Conjoin an optional existing predicate with another one
    ///
    /// The existing predicate stays a single sub-predicate of the result.
    pub fn conjoin(existing: Option<Predicate>, extra: Predicate) -> Predicate {
        match existing {
            None => extra,
            Some(p) => Predicate::and(vec![p, extra]),
        }
    }

    /// Returns true for `And` / `Or` nodes
    pub fn is_compound(&self) -> bool {
        matches!(self, Predicate::And { .. } | Predicate::Or { .. })
    }

    /// Base columns referenced anywhere in the tree
    pub fn referenced_columns(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Predicate::Compare { expr, .. }
            | Predicate::Like { expr, .. }
            | Predicate::InList { expr, .. }
            | Predicate::IsNull { expr, .. } => {
                if let Some(col) = expr.base_column() {
                    out.insert(col.to_string());
                }
            }
            Predicate::And { predicates } | Predicate::Or { predicates } => {
                for p in predicates {
                    p.collect_columns(out);
                }
            }
        }
    }
}
