//! Statement-level IR.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::expr::Expr;
use super::predicate::{CompareOp, Predicate};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC", alias = "asc", alias = "Asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc", alias = "Desc")]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// A table reference with optional alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }

    /// Name rows of this table are qualified with
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// One projected expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub expr: Expr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Projection {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }

    /// Key under which the projected value appears in a result row
    ///
    /// `None` for `*` and unaliased raw SQL.
    pub fn output_key(&self) -> Option<String> {
        if let Some(alias) = &self.alias {
            return Some(alias.clone());
        }
        match &self.expr {
            Expr::Column { name } if name == "*" || name.ends_with(".*") => None,
            Expr::Column { name } => Some(unqualified(name).to_string()),
            _ => None,
        }
    }

    /// Returns true if this projection emits every column
    pub fn is_wildcard(&self) -> bool {
        matches!(&self.expr, Expr::Column { name } if name == "*" || name.ends_with(".*"))
    }
}

/// Strip a table qualifier from a column name
pub(crate) fn unqualified(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Join kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }

    /// Returns true if the join needs an `ON` condition
    pub fn requires_condition(&self) -> bool {
        !matches!(self, JoinKind::Cross)
    }
}

/// `left <op> right` join condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinCondition {
    pub left: Expr,
    pub op: CompareOp,
    pub right: Expr,
}

/// A compiled join clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<JoinCondition>,
}

/// A sort key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Desc,
        }
    }
}

/// Compiled select
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    pub table: TableRef,
    /// Empty means every column
    #[serde(default)]
    pub projection: Vec<Projection>,
    #[serde(default)]
    pub predicate: Option<Predicate>,
    #[serde(default)]
    pub joins: Vec<Join>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

impl SelectQuery {
    /// Select every column of a table
    pub fn from_table(table: TableRef) -> Self {
        Self {
            table,
            projection: Vec::new(),
            predicate: None,
            joins: Vec::new(),
            order_by: Vec::new(),
            group_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Attach a predicate, conjoined with any existing one
    pub fn filter(&mut self, predicate: Predicate) {
        self.predicate = Some(Predicate::conjoin(self.predicate.take(), predicate));
    }

    /// Copy of this query without ordering or windowing, used for counting
    pub fn unwindowed(&self) -> Self {
        Self {
            order_by: Vec::new(),
            limit: None,
            offset: None,
            ..self.clone()
        }
    }
}

/// Compiled insert of one or more rows sharing a column set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertQuery {
    pub table: TableRef,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Compiled update; the predicate is mandatory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateQuery {
    pub table: TableRef,
    pub assignments: Vec<(String, Value)>,
    pub predicate: Predicate,
}

/// Compiled physical delete; the predicate is mandatory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteQuery {
    pub table: TableRef,
    pub predicate: Predicate,
}

/// Any compiled statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "statement", rename_all = "snake_case")]
pub enum Query {
    Select(SelectQuery),
    Count(SelectQuery),
    Insert(InsertQuery),
    Update(UpdateQuery),
    Delete(DeleteQuery),
}

impl Query {
    pub fn table(&self) -> &TableRef {
        match self {
            Query::Select(q) | Query::Count(q) => &q.table,
            Query::Insert(q) => &q.table,
            Query::Update(q) => &q.table,
            Query::Delete(q) => &q.table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_keys() {
        assert_eq!(
            Projection::new(Expr::column("orders.total")).output_key(),
            Some("total".to_string())
        );
        assert_eq!(Projection::new(Expr::column("*")).output_key(), None);
        assert!(Projection::new(Expr::column("u.*")).is_wildcard());
        assert_eq!(
            Projection::aliased(Expr::raw("COUNT(*)"), "n").output_key(),
            Some("n".to_string())
        );
    }

    #[test]
    fn test_filter_conjoins() {
        let mut q = SelectQuery::from_table(TableRef::new("orders"));
        q.filter(Predicate::compare(Expr::column("a"), CompareOp::Eq, json!(1)));
        assert!(!q.predicate.as_ref().unwrap().is_compound());

        q.filter(Predicate::is_null(Expr::column("deleted_at")));
        assert!(matches!(q.predicate, Some(Predicate::And { ref predicates }) if predicates.len() == 2));
    }

    #[test]
    fn test_unwindowed_drops_window() {
        let mut q = SelectQuery::from_table(TableRef::aliased("orders", "o"));
        q.order_by.push(OrderBy::desc(Expr::column("id")));
        q.limit = Some(10);
        q.offset = Some(20);

        let counted = q.unwindowed();
        assert!(counted.order_by.is_empty());
        assert_eq!(counted.limit, None);
        assert_eq!(counted.offset, None);
        assert_eq!(counted.table.qualifier(), "o");
    }

    #[test]
    fn test_sort_direction_parsing() {
        let asc: SortDirection = serde_json::from_value(json!("asc")).unwrap();
        let desc: SortDirection = serde_json::from_value(json!("DESC")).unwrap();
        assert_eq!(asc, SortDirection::Asc);
        assert_eq!(desc, SortDirection::Desc);
        assert_eq!(desc.reversed(), SortDirection::Asc);
    }
}
