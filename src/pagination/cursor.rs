//! Keyset (cursor) pagination.
//!
//! A cursor token is URL-safe base64 (no padding) over a JSON object
//! holding the sort-key values of a boundary row plus a direction flag:
//!
//! ```json
//! {"created_at": "2024-05-01", "id": 17, "_pointsToNextItems": true}
//! ```
//!
//! The cursor column is appended as an ascending tie-break when the sort
//! does not already include it, so cursors stay stable under duplicate
//! sort values.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{Map, Value};

use crate::compiler::JsonPathResolver;
use crate::errors::{QueryError, QueryResult};
use crate::ir::{
    unqualified, CompareOp, Expr, OrderBy, Predicate, Projection, SelectQuery, SortDirection,
};
use crate::result::PaginationMeta;
use crate::store::Row;

const DIRECTION_KEY: &str = "_pointsToNextItems";

/// Decoded cursor
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    values: Map<String, Value>,
    points_to_next: bool,
}

impl Cursor {
    pub fn new(values: Map<String, Value>, points_to_next: bool) -> Self {
        Self {
            values,
            points_to_next,
        }
    }

    pub fn points_to_next(&self) -> bool {
        self.points_to_next
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn encode(&self) -> String {
        let mut payload = self.values.clone();
        payload.insert(DIRECTION_KEY.to_string(), Value::Bool(self.points_to_next));
        URL_SAFE_NO_PAD.encode(Value::Object(payload).to_string())
    }

    pub fn decode(token: &str) -> QueryResult<Self> {
        let invalid = || QueryError::invalid_argument("Invalid pagination cursor");

        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim().trim_end_matches('='))
            .map_err(|_| invalid())?;
        let mut values = match serde_json::from_slice::<Value>(&bytes).map_err(|_| invalid())? {
            Value::Object(map) => map,
            _ => return Err(invalid()),
        };
        let points_to_next = values
            .remove(DIRECTION_KEY)
            .and_then(|v| v.as_bool())
            .ok_or_else(invalid)?;

        Ok(Self {
            values,
            points_to_next,
        })
    }
}

/// State carried from query preparation to page assembly
#[derive(Debug, Clone)]
pub struct CursorPlan {
    keys: Vec<String>,
    cursor: Option<Cursor>,
    per_page: u64,
}

/// Cursor paginator for one request
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    cursor: Option<Cursor>,
    per_page: u64,
    cursor_column: String,
}

impl CursorPaginator {
    /// Validate the limit and decode the token
    pub fn new(
        token: Option<&str>,
        per_page: u64,
        cursor_column: impl Into<String>,
        max_per_page: u64,
    ) -> QueryResult<Self> {
        if per_page == 0 || per_page > max_per_page {
            return Err(QueryError::invalid_argument(format!(
                "limit must be between 1 and {}",
                max_per_page
            )));
        }
        let cursor_column = cursor_column.into();
        if cursor_column.trim().is_empty() {
            return Err(QueryError::invalid_argument("cursor_column must not be empty"));
        }
        let cursor = match token.map(str::trim) {
            Some(t) if !t.is_empty() => Some(Cursor::decode(t)?),
            _ => None,
        };
        Ok(Self {
            cursor,
            per_page,
            cursor_column,
        })
    }

    /// Add the tie-break, keyset predicate and window to the query
    pub fn prepare(
        &self,
        query: &mut SelectQuery,
        resolver: &JsonPathResolver,
    ) -> QueryResult<CursorPlan> {
        let tie_break = resolver.resolve(&self.cursor_column)?;
        if !query.order_by.iter().any(|o| same_column(&o.expr, &tie_break)) {
            query.order_by.push(OrderBy::asc(tie_break));
        }

        let keys = query
            .order_by
            .iter()
            .map(|o| sort_key(&o.expr, resolver))
            .collect::<QueryResult<Vec<_>>>()?;

        expose_keys(query, &keys);

        if let Some(cursor) = &self.cursor {
            if !cursor.points_to_next {
                for order in &mut query.order_by {
                    order.direction = order.direction.reversed();
                }
            }

            let values = keys
                .iter()
                .map(|key| {
                    cursor.value(key).cloned().ok_or_else(|| {
                        QueryError::invalid_argument(format!("Cursor is missing key '{}'", key))
                    })
                })
                .collect::<QueryResult<Vec<_>>>()?;

            query.filter(keyset_predicate(&query.order_by, &values));
        }

        query.limit = Some(self.per_page.saturating_add(1));
        query.offset = None;

        Ok(CursorPlan {
            keys,
            cursor: self.cursor.clone(),
            per_page: self.per_page,
        })
    }

    /// Trim the look-ahead row, restore order and build metadata
    pub fn finish(&self, plan: &CursorPlan, mut rows: Vec<Row>) -> (Vec<Row>, PaginationMeta) {
        let per_page = plan.per_page as usize;
        let has_extra = rows.len() > per_page;
        rows.truncate(per_page);

        let backward = plan.cursor.as_ref().is_some_and(|c| !c.points_to_next);
        if backward {
            rows.reverse();
        }

        let (next, prev, has_more) = match &plan.cursor {
            None => (has_extra, false, has_extra),
            Some(c) if c.points_to_next => (has_extra, true, has_extra),
            Some(_) => (true, has_extra, true),
        };

        let next_cursor = next
            .then(|| rows.last())
            .flatten()
            .map(|row| boundary(&plan.keys, row, true).encode());
        let prev_cursor = prev
            .then(|| rows.first())
            .flatten()
            .map(|row| boundary(&plan.keys, row, false).encode());

        let meta = PaginationMeta::Cursor {
            count: rows.len() as u64,
            per_page: plan.per_page,
            has_more,
            next_cursor,
            prev_cursor,
        };
        (rows, meta)
    }
}

impl CursorPlan {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

/// `(a > x) OR (a = x AND b > y) OR ...`, with `<` for descending keys
fn keyset_predicate(order_by: &[OrderBy], values: &[Value]) -> Predicate {
    let branches = (0..order_by.len())
        .map(|i| {
            let mut terms: Vec<Predicate> = order_by[..i]
                .iter()
                .zip(values)
                .map(|(o, v)| Predicate::compare(o.expr.clone(), CompareOp::Eq, v.clone()))
                .collect();
            let op = match order_by[i].direction {
                SortDirection::Asc => CompareOp::Gt,
                SortDirection::Desc => CompareOp::Lt,
            };
            terms.push(Predicate::compare(order_by[i].expr.clone(), op, values[i].clone()));
            if terms.len() == 1 {
                terms.remove(0)
            } else {
                Predicate::and(terms)
            }
        })
        .collect::<Vec<_>>();

    if branches.len() == 1 {
        branches.into_iter().next().unwrap_or_else(|| Predicate::or(Vec::new()))
    } else {
        Predicate::or(branches)
    }
}

/// Result-row key under which a sort expression's value appears
fn sort_key(expr: &Expr, resolver: &JsonPathResolver) -> QueryResult<String> {
    match expr {
        Expr::Column { name } => Ok(unqualified(name).to_string()),
        Expr::JsonExtract { column, path } => {
            let sep = resolver.separator();
            Ok(resolver.alias(&format!("{}{}{}", column, sep, path.join(sep))))
        }
        Expr::Lower { expr } | Expr::Cast { expr, .. } => sort_key(expr, resolver),
        Expr::Raw { sql } => Err(QueryError::invalid_argument(format!(
            "Cursor pagination cannot order by an SQL expression: {}",
            sql
        ))),
    }
}

/// Make sure every sort key is part of the projection
fn expose_keys(query: &mut SelectQuery, keys: &[String]) {
    let has_wildcard =
        query.projection.is_empty() || query.projection.iter().any(Projection::is_wildcard);

    let missing: Vec<Projection> = query
        .order_by
        .iter()
        .zip(keys)
        .filter(|(order, key)| {
            let covered_by_wildcard = has_wildcard && matches!(order.expr, Expr::Column { .. });
            let projected = query
                .projection
                .iter()
                .any(|p| p.output_key().as_deref() == Some(key.as_str()));
            !covered_by_wildcard && !projected
        })
        .map(|(order, key)| match &order.expr {
            Expr::Column { .. } => Projection::new(order.expr.clone()),
            other => Projection::aliased(other.clone(), key.clone()),
        })
        .collect();

    if missing.is_empty() {
        return;
    }
    if query.projection.is_empty() {
        query.projection.push(Projection::new(Expr::column("*")));
    }
    query.projection.extend(missing);
}

fn same_column(a: &Expr, b: &Expr) -> bool {
    match (a, b) {
        (Expr::Column { name: x }, Expr::Column { name: y }) => unqualified(x) == unqualified(y),
        _ => a == b,
    }
}

fn boundary(keys: &[String], row: &Row, points_to_next: bool) -> Cursor {
    let values = keys
        .iter()
        .map(|key| (key.clone(), row.get(key).cloned().unwrap_or(Value::Null)))
        .collect();
    Cursor::new(values, points_to_next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::TableRef;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_cursor_token_round_trip() {
        let cursor = Cursor::new(row(json!({"id": 7, "created_at": "2024-01-01"})), false);
        let token = cursor.encode();
        assert!(!token.contains('=') && !token.contains('+') && !token.contains('/'));
        assert_eq!(Cursor::decode(&token).unwrap(), cursor);
    }

    #[test]
    fn test_invalid_tokens_rejected() {
        assert!(Cursor::decode("!!!").is_err());
        let no_flag = URL_SAFE_NO_PAD.encode(r#"{"id": 1}"#);
        assert!(Cursor::decode(&no_flag).is_err());
        assert!(CursorPaginator::new(Some("%%"), 10, "id", 100).is_err());
    }

    #[test]
    fn test_limit_validation() {
        assert!(CursorPaginator::new(None, 0, "id", 100).is_err());
        assert!(CursorPaginator::new(None, 101, "id", 100).is_err());
        assert!(CursorPaginator::new(None, 10, " ", 100).is_err());
    }

    #[test]
    fn test_prepare_first_page_appends_tie_break() {
        let paginator = CursorPaginator::new(None, 2, "id", 100).unwrap();
        let mut q = SelectQuery::from_table(TableRef::new("orders"));
        q.order_by.push(OrderBy::desc(Expr::column("created_at")));

        let plan = paginator.prepare(&mut q, &JsonPathResolver::default()).unwrap();
        assert_eq!(plan.keys(), ["created_at".to_string(), "id".to_string()]);
        assert_eq!(q.order_by[1], OrderBy::asc(Expr::column("id")));
        assert_eq!(q.limit, Some(3));
        assert!(q.predicate.is_none());
    }

    #[test]
    fn test_unbounded_limit_saturates() {
        let paginator = CursorPaginator::new(None, u64::MAX, "id", u64::MAX).unwrap();
        let mut q = SelectQuery::from_table(TableRef::new("orders"));
        paginator.prepare(&mut q, &JsonPathResolver::default()).unwrap();
        assert_eq!(q.limit, Some(u64::MAX));
    }

    #[test]
    fn test_existing_tie_break_not_duplicated() {
        let paginator = CursorPaginator::new(None, 2, "id", 100).unwrap();
        let mut q = SelectQuery::from_table(TableRef::new("orders"));
        q.order_by.push(OrderBy::desc(Expr::column("orders.id")));
        paginator.prepare(&mut q, &JsonPathResolver::default()).unwrap();
        assert_eq!(q.order_by.len(), 1);
    }

    #[test]
    fn test_keyset_predicate_shape() {
        let token = Cursor::new(row(json!({"created_at": "2024-01-02", "id": 5})), true).encode();
        let paginator = CursorPaginator::new(Some(&token), 2, "id", 100).unwrap();
        let mut q = SelectQuery::from_table(TableRef::new("orders"));
        q.order_by.push(OrderBy::desc(Expr::column("created_at")));
        paginator.prepare(&mut q, &JsonPathResolver::default()).unwrap();

        assert_eq!(
            q.predicate,
            Some(Predicate::or(vec![
                Predicate::compare(Expr::column("created_at"), CompareOp::Lt, json!("2024-01-02")),
                Predicate::and(vec![
                    Predicate::compare(Expr::column("created_at"), CompareOp::Eq, json!("2024-01-02")),
                    Predicate::compare(Expr::column("id"), CompareOp::Gt, json!(5)),
                ]),
            ]))
        );
    }

    #[test]
    fn test_backward_cursor_reverses_order() {
        let token = Cursor::new(row(json!({"id": 5})), false).encode();
        let paginator = CursorPaginator::new(Some(&token), 2, "id", 100).unwrap();
        let mut q = SelectQuery::from_table(TableRef::new("orders"));
        let plan = paginator.prepare(&mut q, &JsonPathResolver::default()).unwrap();

        assert_eq!(q.order_by, vec![OrderBy::desc(Expr::column("id"))]);
        assert_eq!(
            q.predicate,
            Some(Predicate::compare(Expr::column("id"), CompareOp::Lt, json!(5)))
        );

        let (rows, meta) = paginator.finish(&plan, vec![row(json!({"id": 4})), row(json!({"id": 3}))]);
        assert_eq!(rows[0].get("id"), Some(&json!(3)));
        match meta {
            PaginationMeta::Cursor {
                has_more,
                next_cursor,
                prev_cursor,
                ..
            } => {
                assert!(has_more);
                assert!(next_cursor.is_some());
                assert!(prev_cursor.is_none());
            }
            other => panic!("expected cursor meta, got {:?}", other),
        }
    }

    #[test]
    fn test_finish_first_page() {
        let paginator = CursorPaginator::new(None, 2, "id", 100).unwrap();
        let mut q = SelectQuery::from_table(TableRef::new("orders"));
        let plan = paginator.prepare(&mut q, &JsonPathResolver::default()).unwrap();

        let rows = vec![row(json!({"id": 1})), row(json!({"id": 2})), row(json!({"id": 3}))];
        let (rows, meta) = paginator.finish(&plan, rows);
        assert_eq!(rows.len(), 2);
        let PaginationMeta::Cursor {
            count,
            has_more,
            next_cursor,
            prev_cursor,
            ..
        } = meta
        else {
            panic!("expected cursor meta");
        };
        assert_eq!(count, 2);
        assert!(has_more);
        assert!(prev_cursor.is_none());
        let next = Cursor::decode(&next_cursor.unwrap()).unwrap();
        assert_eq!(next.value("id"), Some(&json!(2)));
        assert!(next.points_to_next());
    }

    #[test]
    fn test_json_path_sort_is_projected() {
        let paginator = CursorPaginator::new(None, 2, "id", 100).unwrap();
        let mut q = SelectQuery::from_table(TableRef::new("orders"));
        q.projection.push(Projection::new(Expr::column("status")));
        q.order_by
            .push(OrderBy::asc(Expr::json("meta", vec!["rank".to_string()])));
        let plan = paginator.prepare(&mut q, &JsonPathResolver::default()).unwrap();

        assert_eq!(plan.keys(), ["meta_rank".to_string(), "id".to_string()]);
        let keys: Vec<_> = q.projection.iter().filter_map(Projection::output_key).collect();
        assert_eq!(keys, vec!["status", "meta_rank", "id"]);
    }

    #[test]
    fn test_raw_sort_rejected() {
        let paginator = CursorPaginator::new(None, 2, "id", 100).unwrap();
        let mut q = SelectQuery::from_table(TableRef::new("orders"));
        q.order_by.push(OrderBy::asc(Expr::raw("RANDOM()")));
        assert!(paginator.prepare(&mut q, &JsonPathResolver::default()).is_err());
    }
}
