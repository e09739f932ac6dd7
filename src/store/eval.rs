//! In-memory evaluation of IR expressions and predicates.
//!
//! Comparisons follow SQL: anything compared with NULL is not satisfied,
//! and a string compared with a number is compared numerically when it
//! parses as one.

use std::cmp::Ordering;

use serde_json::Value;

use super::{Row, StoreError, StoreResult};
use crate::ir::{CastType, CompareOp, Expr, JoinCondition, Predicate, SortDirection};

pub(super) fn eval_expr(expr: &Expr, row: &Row) -> StoreResult<Value> {
    match expr {
        Expr::Column { name } if name == "*" || name.ends_with(".*") => Err(StoreError::Query(
            format!("Wildcard '{}' is not a scalar expression", name),
        )),
        Expr::Column { name } => Ok(row.get(name).cloned().unwrap_or(Value::Null)),
        Expr::JsonExtract { column, path } => {
            let mut current = match row.get(column) {
                Some(Value::String(s)) => serde_json::from_str(s).unwrap_or(Value::Null),
                Some(other) => other.clone(),
                None => Value::Null,
            };
            for segment in path {
                current = match current {
                    Value::Object(mut map) => map.remove(segment).unwrap_or(Value::Null),
                    Value::Array(items) => segment
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| items.into_iter().nth(i))
                        .unwrap_or(Value::Null),
                    _ => Value::Null,
                };
            }
            Ok(to_text(current))
        }
        Expr::Raw { sql } => Err(StoreError::Unsupported(format!(
            "raw SQL cannot be evaluated in memory: {}",
            sql
        ))),
        Expr::Lower { expr } => Ok(match to_text(eval_expr(expr, row)?) {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        }),
        Expr::Cast { expr, to } => cast(eval_expr(expr, row)?, *to),
    }
}

pub(super) fn eval_predicate(predicate: &Predicate, row: &Row) -> StoreResult<bool> {
    match predicate {
        Predicate::Compare { expr, op, value } => {
            let left = eval_expr(expr, row)?;
            Ok(satisfies(compare_values(&left, value), *op))
        }
        Predicate::Like {
            expr,
            pattern,
            negated,
        } => match to_text(eval_expr(expr, row)?) {
            Value::String(text) => Ok(like_match(&text, pattern) != *negated),
            _ => Ok(false),
        },
        Predicate::InList {
            expr,
            values,
            negated,
        } => {
            let left = eval_expr(expr, row)?;
            if left.is_null() {
                return Ok(false);
            }
            let found = values
                .iter()
                .any(|v| compare_values(&left, v) == Some(Ordering::Equal));
            Ok(found != *negated)
        }
        Predicate::IsNull { expr, negated } => Ok(eval_expr(expr, row)?.is_null() != *negated),
        Predicate::And { predicates } => {
            for p in predicates {
                if !eval_predicate(p, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or { predicates } => {
            for p in predicates {
                if eval_predicate(p, row)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

pub(super) fn eval_join_condition(condition: &JoinCondition, row: &Row) -> StoreResult<bool> {
    let left = eval_expr(&condition.left, row)?;
    let right = eval_expr(&condition.right, row)?;
    Ok(satisfies(compare_values(&left, &right), condition.op))
}

/// Ordering of two non-null values; `None` when incomparable or either is NULL
pub(super) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&parse_number(y)?),
        (Value::String(x), Value::Number(y)) => parse_number(x)?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

/// Sort order with NULLs last ascending and first descending
pub(super) fn sort_order(a: &Value, b: &Value, direction: SortDirection) -> Ordering {
    let ord = match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare_values(a, b).unwrap_or(Ordering::Equal),
    };
    match direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

/// SQL LIKE: `%` matches any run of characters, `_` exactly one
pub(super) fn like_match(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    like_chars(&value, &pattern)
}

fn like_chars(value: &[char], pattern: &[char]) -> bool {
    match pattern.split_first() {
        None => value.is_empty(),
        Some(('%', rest)) => {
            if rest.is_empty() {
                return true;
            }
            (0..=value.len()).any(|i| like_chars(&value[i..], rest))
        }
        Some(('_', rest)) => !value.is_empty() && like_chars(&value[1..], rest),
        Some((p, rest)) => value.first() == Some(p) && like_chars(&value[1..], rest),
    }
}

fn satisfies(ordering: Option<Ordering>, op: CompareOp) -> bool {
    let Some(ord) = ordering else {
        return false;
    };
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::NotEq => ord != Ordering::Equal,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Lt => ord == Ordering::Less,
        CompareOp::Gte => ord != Ordering::Less,
        CompareOp::Lte => ord != Ordering::Greater,
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

/// Text rendering of a value, as `->>` yields
fn to_text(value: Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(s),
        other => Value::String(other.to_string()),
    }
}

fn cast(value: Value, to: CastType) -> StoreResult<Value> {
    match to {
        CastType::Uuid => Ok(to_text(value)),
        CastType::Integer => match value {
            Value::Null => Ok(Value::Null),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::Number(n)),
            Value::Number(n) => Ok(Value::from(n.as_f64().unwrap_or_default().trunc() as i64)),
            Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| {
                StoreError::Query(format!("invalid input syntax for type integer: \"{}\"", s))
            }),
            other => Err(StoreError::Query(format!(
                "cannot cast {} to integer",
                other
            ))),
        },
    }
}
