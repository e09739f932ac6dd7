//! Filter tree to predicate compilation.

use chrono::NaiveDate;
use serde_json::Value;

use super::json_path::JsonPathResolver;
use super::presets::{format_date, parse_literal_range, resolve_preset, DatePreset, DateRange};
use crate::errors::{QueryError, QueryResult};
use crate::filter::{Combinator, FilterCondition, FilterGroup, FilterNode, FilterOperator};
use crate::ir::{CompareOp, Expr, Predicate};

/// Compiles filter groups into predicate trees
#[derive(Debug, Clone, Default)]
pub struct PredicateCompiler {
    resolver: JsonPathResolver,
}

impl PredicateCompiler {
    pub fn new(resolver: JsonPathResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &JsonPathResolver {
        &self.resolver
    }

    /// Compile a group; nested groups become nested sub-predicates
    ///
    /// `today` anchors date presets.
    pub fn compile(&self, group: &FilterGroup, today: NaiveDate) -> QueryResult<Predicate> {
        let predicates = group
            .conditions
            .iter()
            .map(|node| match node {
                FilterNode::Group(g) => self.compile(g, today),
                FilterNode::Condition(c) => self.compile_condition(c, today),
            })
            .collect::<QueryResult<Vec<_>>>()?;

        Ok(match group.combinator {
            Combinator::And => Predicate::and(predicates),
            Combinator::Or => Predicate::or(predicates),
        })
    }

    /// Compile one leaf condition
    pub fn compile_condition(
        &self,
        condition: &FilterCondition,
        today: NaiveDate,
    ) -> QueryResult<Predicate> {
        let expr = self.resolver.resolve_attribute(&condition.attribute)?;
        let op = condition.operator;

        match op {
            FilterOperator::IsEmpty => return Ok(Predicate::is_null(expr)),
            FilterOperator::IsNotEmpty => return Ok(Predicate::is_not_null(expr)),
            _ => {}
        }

        let value = condition.value.as_ref().ok_or_else(|| {
            QueryError::invalid_argument(format!(
                "Operator '{}' on '{}' requires a value",
                op, condition.attribute
            ))
        })?;

        match op {
            FilterOperator::Contains | FilterOperator::NotContains => Ok(Predicate::Like {
                expr: expr.lower(),
                pattern: format!("%{}%", text_of(value).to_lowercase()),
                negated: op == FilterOperator::NotContains,
            }),
            FilterOperator::IsAnyOf | FilterOperator::IsNoneOf => {
                let values = match value {
                    Value::Array(items) => items.clone(),
                    scalar => vec![scalar.clone()],
                };
                if values.is_empty() {
                    return Err(QueryError::invalid_argument(format!(
                        "Operator '{}' on '{}' requires a non-empty list",
                        op, condition.attribute
                    )));
                }
                Ok(Predicate::InList {
                    expr,
                    values,
                    negated: op == FilterOperator::IsNoneOf,
                })
            }
            _ => self.compile_comparison(condition, expr, value, today),
        }
    }

    fn compile_comparison(
        &self,
        condition: &FilterCondition,
        expr: Expr,
        value: &Value,
        today: NaiveDate,
    ) -> QueryResult<Predicate> {
        let op = condition.operator;

        if let Some(name) = value.as_str() {
            match resolve_preset(name, today) {
                Some(DatePreset::Single(day)) => {
                    return Ok(Predicate::compare(expr, compare_op(op)?, date_value(day)))
                }
                Some(DatePreset::Range(range)) => return Ok(range_predicate(expr, range)),
                None => {}
            }
        }

        if value.is_array() {
            return match (op, parse_literal_range(value)) {
                (FilterOperator::Is, Some(range)) => Ok(range_predicate(expr, range)),
                (FilterOperator::IsNot, Some(range)) => Ok(negated_range_predicate(expr, range)),
                _ => Err(QueryError::invalid_argument(format!(
                    "Operator '{}' on '{}' does not accept a list value",
                    op, condition.attribute
                ))),
            };
        }

        Ok(Predicate::compare(expr, compare_op(op)?, value.clone()))
    }
}

fn compare_op(op: FilterOperator) -> QueryResult<CompareOp> {
    match op {
        FilterOperator::Is => Ok(CompareOp::Eq),
        FilterOperator::IsNot => Ok(CompareOp::NotEq),
        FilterOperator::GreaterThan => Ok(CompareOp::Gt),
        FilterOperator::LessThan => Ok(CompareOp::Lt),
        FilterOperator::GreaterThanOrEqual => Ok(CompareOp::Gte),
        FilterOperator::LessThanOrEqual => Ok(CompareOp::Lte),
        other => Err(QueryError::invalid_argument(format!(
            "Operator '{}' is not a comparison",
            other
        ))),
    }
}

fn date_value(day: NaiveDate) -> Value {
    Value::String(format_date(day))
}

/// `expr >= start AND expr <= end`, or the single bounded side
fn range_predicate(expr: Expr, range: DateRange) -> Predicate {
    match (range.start, range.end) {
        (Some(start), Some(end)) => Predicate::and(vec![
            Predicate::compare(expr.clone(), CompareOp::Gte, date_value(start)),
            Predicate::compare(expr, CompareOp::Lte, date_value(end)),
        ]),
        (None, Some(end)) => Predicate::compare(expr, CompareOp::Lte, date_value(end)),
        (Some(start), None) => Predicate::compare(expr, CompareOp::Gte, date_value(start)),
        (None, None) => Predicate::and(Vec::new()),
    }
}

/// `expr < start OR expr > end`
fn negated_range_predicate(expr: Expr, range: DateRange) -> Predicate {
    let mut outside = Vec::with_capacity(2);
    if let Some(start) = range.start {
        outside.push(Predicate::compare(expr.clone(), CompareOp::Lt, date_value(start)));
    }
    if let Some(end) = range.end {
        outside.push(Predicate::compare(expr, CompareOp::Gt, date_value(end)));
    }
    Predicate::or(outside)
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
