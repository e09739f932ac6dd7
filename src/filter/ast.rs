//! Filter node types and their JSON boundary.
//!
//! Accepted JSON shapes:
//!
//! ```text
//! group:     {"op": "and" | "or", "conditions": [<group | condition>, ...]}
//! condition: {"attribute": "status", "op": "is", "value": "paid"}
//! ```
//!
//! A node is a group iff it carries `conditions`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{QueryError, QueryResult};

/// Comparison operators accepted in filter conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Is,
    IsNot,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Contains,
    NotContains,
    IsAnyOf,
    IsNoneOf,
    IsEmpty,
    IsNotEmpty,
}

impl FilterOperator {
    /// Get the operator string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Is => "is",
            FilterOperator::IsNot => "is_not",
            FilterOperator::GreaterThan => "greater_than",
            FilterOperator::LessThan => "less_than",
            FilterOperator::GreaterThanOrEqual => "greater_than_or_equal",
            FilterOperator::LessThanOrEqual => "less_than_or_equal",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "not_contains",
            FilterOperator::IsAnyOf => "is_any_of",
            FilterOperator::IsNoneOf => "is_none_of",
            FilterOperator::IsEmpty => "is_empty",
            FilterOperator::IsNotEmpty => "is_not_empty",
        }
    }

    /// Returns true if a condition using this operator must carry a value
    pub fn requires_value(&self) -> bool {
        !matches!(self, FilterOperator::IsEmpty | FilterOperator::IsNotEmpty)
    }

    /// Returns true for the case-insensitive substring operators
    pub fn is_substring(&self) -> bool {
        matches!(self, FilterOperator::Contains | FilterOperator::NotContains)
    }

    /// Returns true for the set membership operators
    pub fn is_membership(&self) -> bool {
        matches!(self, FilterOperator::IsAnyOf | FilterOperator::IsNoneOf)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.to_lowercase().as_str() {
            "is" => FilterOperator::Is,
            "is_not" => FilterOperator::IsNot,
            "greater_than" => FilterOperator::GreaterThan,
            "less_than" => FilterOperator::LessThan,
            "greater_than_or_equal" => FilterOperator::GreaterThanOrEqual,
            "less_than_or_equal" => FilterOperator::LessThanOrEqual,
            "contains" => FilterOperator::Contains,
            "not_contains" => FilterOperator::NotContains,
            "is_any_of" => FilterOperator::IsAnyOf,
            "is_none_of" => FilterOperator::IsNoneOf,
            "is_empty" => FilterOperator::IsEmpty,
            "is_not_empty" => FilterOperator::IsNotEmpty,
            other => {
                return Err(QueryError::invalid_argument(format!(
                    "Unsupported operator: {}",
                    other
                )))
            }
        };
        Ok(op)
    }
}

/// Boolean combinator of a filter group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Combinator::And => "and",
            Combinator::Or => "or",
        }
    }
}

impl FromStr for Combinator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "and" => Ok(Combinator::And),
            "or" => Ok(Combinator::Or),
            other => Err(QueryError::invalid_argument(format!(
                "Unsupported filter combinator: {}",
                other
            ))),
        }
    }
}

/// A single leaf condition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterCondition {
    /// Column, JSON path (`meta->info->tags`) or raw SQL expression
    pub attribute: String,

    /// Comparison operator
    #[serde(rename = "op")]
    pub operator: FilterOperator,

    /// Comparison value; `None` when absent or JSON null
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FilterCondition {
    /// Create a new condition
    pub fn new(attribute: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value: if value.is_null() { None } else { Some(value) },
        }
    }

    /// Create a condition that takes no value (`is_empty` / `is_not_empty`)
    pub fn unary(attribute: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            value: None,
        }
    }

    /// Create an equality condition
    pub fn is(attribute: impl Into<String>, value: Value) -> Self {
        Self::new(attribute, FilterOperator::Is, value)
    }

    fn from_object(obj: &Map<String, Value>) -> QueryResult<Self> {
        let attribute = obj
            .get("attribute")
            .and_then(Value::as_str)
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| QueryError::invalid_argument("Filter condition requires an attribute"))?;

        let operator: FilterOperator = obj
            .get("op")
            .or_else(|| obj.get("operator"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                QueryError::invalid_argument(format!(
                    "Filter condition on '{}' requires an operator",
                    attribute
                ))
            })?
            .parse()?;

        let value = obj.get("value").filter(|v| !v.is_null()).cloned();

        if operator.requires_value() && value.is_none() {
            return Err(QueryError::invalid_argument(format!(
                "Operator '{}' on '{}' requires a value",
                operator, attribute
            )));
        }

        Ok(Self {
            attribute: attribute.to_string(),
            operator,
            value,
        })
    }
}

/// A node of the filter tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterNode {
    Group(FilterGroup),
    Condition(FilterCondition),
}

impl FilterNode {
    fn from_value(value: &Value) -> QueryResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| QueryError::invalid_argument("Filter node must be an object"))?;

        if obj.contains_key("conditions") {
            FilterGroup::from_object(obj).map(FilterNode::Group)
        } else {
            FilterCondition::from_object(obj).map(FilterNode::Condition)
        }
    }
}

impl From<FilterCondition> for FilterNode {
    fn from(c: FilterCondition) -> Self {
        FilterNode::Condition(c)
    }
}

impl From<FilterGroup> for FilterNode {
    fn from(g: FilterGroup) -> Self {
        FilterNode::Group(g)
    }
}

/// A recursive AND / OR group; never empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct FilterGroup {
    #[serde(rename = "op")]
    pub combinator: Combinator,
    pub conditions: Vec<FilterNode>,
}

impl FilterGroup {
    /// Create a group, rejecting an empty condition list
    pub fn new(combinator: Combinator, conditions: Vec<FilterNode>) -> QueryResult<Self> {
        if conditions.is_empty() {
            return Err(QueryError::invalid_argument(
                "Filter group requires at least one condition",
            ));
        }
        Ok(Self {
            combinator,
            conditions,
        })
    }

    /// Create an AND group
    pub fn and(conditions: Vec<FilterNode>) -> QueryResult<Self> {
        Self::new(Combinator::And, conditions)
    }

    /// Create an OR group
    pub fn or(conditions: Vec<FilterNode>) -> QueryResult<Self> {
        Self::new(Combinator::Or, conditions)
    }

    /// Parse and validate a filter tree from its JSON shape
    pub fn from_value(value: &Value) -> QueryResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| QueryError::invalid_argument("Filters must be an object"))?;
        Self::from_object(obj)
    }

    fn from_object(obj: &Map<String, Value>) -> QueryResult<Self> {
        let combinator: Combinator = obj
            .get("op")
            .or_else(|| obj.get("combinator"))
            .and_then(Value::as_str)
            .ok_or_else(|| QueryError::invalid_argument("Filter group requires an 'op' combinator"))?
            .parse()?;

        let conditions = obj
            .get("conditions")
            .and_then(Value::as_array)
            .ok_or_else(|| QueryError::invalid_argument("Filter group conditions must be an array"))?
            .iter()
            .map(FilterNode::from_value)
            .collect::<QueryResult<Vec<_>>>()?;

        Self::new(combinator, conditions)
    }

    /// Iterate over every leaf condition, depth first
    pub fn leaves(&self) -> Vec<&FilterCondition> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }

    /// Maximum nesting depth; a flat group has depth 1
    pub fn depth(&self) -> usize {
        1 + self
            .conditions
            .iter()
            .map(|node| match node {
                FilterNode::Group(g) => g.depth(),
                FilterNode::Condition(_) => 0,
            })
            .max()
            .unwrap_or(0)
    }
}

fn collect_leaves<'a>(group: &'a FilterGroup, out: &mut Vec<&'a FilterCondition>) {
    for node in &group.conditions {
        match node {
            FilterNode::Group(g) => collect_leaves(g, out),
            FilterNode::Condition(c) => out.push(c),
        }
    }
}

impl TryFrom<Value> for FilterGroup {
    type Error = QueryError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}
