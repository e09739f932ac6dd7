//! Join validation and compilation.

use super::json_path::JsonPathResolver;
use crate::errors::{QueryError, QueryResult};
use crate::ir::{CastType, CompareOp, Join, JoinCondition, JoinKind, TableRef};
use crate::operation::JoinSpec;

/// Compiles join specifications into IR joins
#[derive(Debug, Clone, Default)]
pub struct JoinCompiler {
    resolver: JsonPathResolver,
}

impl JoinCompiler {
    pub fn new(resolver: JsonPathResolver) -> Self {
        Self { resolver }
    }

    pub fn compile_all(&self, specs: &[JoinSpec]) -> QueryResult<Vec<Join>> {
        specs.iter().map(|spec| self.compile(spec)).collect()
    }

    /// Validate and compile one join
    pub fn compile(&self, spec: &JoinSpec) -> QueryResult<Join> {
        let kind = parse_kind(&spec.kind)?;

        if spec.table.trim().is_empty() {
            return Err(QueryError::invalid_argument("Join table is required"));
        }

        let table = match spec.alias.as_deref().map(str::trim) {
            Some(alias) if !alias.is_empty() => TableRef::aliased(spec.table.trim(), alias),
            _ => TableRef::new(spec.table.trim()),
        };

        if !kind.requires_condition() {
            return Ok(Join {
                kind,
                table,
                on: None,
            });
        }

        let on = match spec.on.as_deref() {
            Some(on) if on.len() == 3 => on,
            _ => {
                return Err(QueryError::invalid_argument(format!(
                    "Join on '{}' requires 'on' with exactly 3 elements [left, operator, right]",
                    spec.table
                )))
            }
        };

        let op = CompareOp::from_sql(&on[1]).ok_or_else(|| {
            QueryError::invalid_argument(format!("Unsupported join operator: {}", on[1]))
        })?;

        let mut left = self.resolver.resolve_attribute(&on[0])?;
        let mut right = self.resolver.resolve_attribute(&on[2])?;

        if let (Some(left_type), Some(right_type)) = (&spec.left_col_type, &spec.right_col_type) {
            match coercion(left_type, right_type) {
                Some((Side::Left, cast)) => left = left.cast(cast),
                Some((Side::Right, cast)) => right = right.cast(cast),
                None => {}
            }
        }

        Ok(Join {
            kind,
            table,
            on: Some(JoinCondition { left, op, right }),
        })
    }
}

fn parse_kind(kind: &str) -> QueryResult<JoinKind> {
    match kind.trim().to_lowercase().as_str() {
        "" | "inner" | "join" => Ok(JoinKind::Inner),
        "left" => Ok(JoinKind::Left),
        "right" => Ok(JoinKind::Right),
        "cross" => Ok(JoinKind::Cross),
        other => Err(QueryError::invalid_argument(format!(
            "Unsupported join type: {}",
            other
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Which side to cast, and to what, for a pair of declared column types
fn coercion(left: &str, right: &str) -> Option<(Side, CastType)> {
    let left = left.trim().to_lowercase();
    let right = right.trim().to_lowercase();
    if left == right {
        return None;
    }

    let is_integer = |t: &str| t == "integer" || t == "id";

    match (left.as_str(), right.as_str()) {
        ("string", "uuid") => Some((Side::Left, CastType::Uuid)),
        ("uuid", "string") => Some((Side::Right, CastType::Uuid)),
        ("string", r) if is_integer(r) => Some((Side::Left, CastType::Integer)),
        (l, "string") if is_integer(l) => Some((Side::Right, CastType::Integer)),
        _ => None,
    }
}
