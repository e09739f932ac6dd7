//! IR to SQL text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::dialect::Dialect;
use crate::ir::{
    DeleteQuery, Expr, InsertQuery, Join, OrderBy, Predicate, Projection, Query, SelectQuery,
    TableRef, UpdateQuery,
};

/// Rendered statement
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderedQuery {
    /// SQL with positional placeholders
    pub sql: String,
    /// SQL with bindings inlined as literals
    pub raw_sql: String,
    /// Values for the placeholders, in order
    pub bindings: Vec<Value>,
}

/// Accumulates placeholder SQL, inline SQL and bindings in lockstep
struct SqlWriter {
    dialect: Dialect,
    sql: String,
    raw: String,
    bindings: Vec<Value>,
}

impl SqlWriter {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(128),
            raw: String::with_capacity(128),
            bindings: Vec::new(),
        }
    }

    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
        self.raw.push_str(text);
    }

    fn bind(&mut self, value: &Value) {
        self.bindings.push(value.clone());
        self.sql
            .push_str(&self.dialect.placeholder(self.bindings.len()));
        self.raw.push_str(&self.dialect.literal(value));
    }

    fn finish(self) -> RenderedQuery {
        RenderedQuery {
            sql: self.sql,
            raw_sql: self.raw,
            bindings: self.bindings,
        }
    }
}

/// Renders IR statements for one dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlRenderer {
    dialect: Dialect,
}

impl SqlRenderer {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Render any statement
    pub fn render(&self, query: &Query) -> RenderedQuery {
        match query {
            Query::Select(q) => self.render_select(q),
            Query::Count(q) => self.render_count(q),
            Query::Insert(q) => self.render_insert(q),
            Query::Update(q) => self.render_update(q),
            Query::Delete(q) => self.render_delete(q),
        }
    }

    pub fn render_select(&self, query: &SelectQuery) -> RenderedQuery {
        let mut w = SqlWriter::new(self.dialect);
        self.write_select(&mut w, query);
        w.finish()
    }

    /// `COUNT(*)` over the unwindowed select; grouped selects are counted as a subquery
    pub fn render_count(&self, query: &SelectQuery) -> RenderedQuery {
        let mut w = SqlWriter::new(self.dialect);
        let base = query.unwindowed();

        if base.group_by.is_empty() {
            w.push("SELECT COUNT(*) AS aggregate FROM ");
            self.write_table(&mut w, &base.table);
            self.write_joins(&mut w, &base.joins);
            self.write_where(&mut w, base.predicate.as_ref());
        } else {
            w.push("SELECT COUNT(*) AS aggregate FROM (");
            self.write_select(&mut w, &base);
            w.push(") AS aggregate_table");
        }
        w.finish()
    }

    pub fn render_insert(&self, query: &InsertQuery) -> RenderedQuery {
        let mut w = SqlWriter::new(self.dialect);
        w.push("INSERT INTO ");
        self.write_table(&mut w, &query.table);

        let columns = query
            .columns
            .iter()
            .map(|c| self.dialect.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        w.push(&format!(" ({}) VALUES ", columns));

        for (i, row) in query.rows.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.push("(");
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    w.push(", ");
                }
                w.bind(value);
            }
            w.push(")");
        }
        w.finish()
    }

    pub fn render_update(&self, query: &UpdateQuery) -> RenderedQuery {
        let mut w = SqlWriter::new(self.dialect);
        w.push("UPDATE ");
        self.write_table(&mut w, &query.table);
        w.push(" SET ");
        for (i, (column, value)) in query.assignments.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.push(&self.dialect.quote_identifier(column));
            w.push(" = ");
            w.bind(value);
        }
        self.write_where(&mut w, Some(&query.predicate));
        w.finish()
    }

    pub fn render_delete(&self, query: &DeleteQuery) -> RenderedQuery {
        let mut w = SqlWriter::new(self.dialect);
        w.push("DELETE FROM ");
        self.write_table(&mut w, &query.table);
        self.write_where(&mut w, Some(&query.predicate));
        w.finish()
    }

    /// Render a single expression (no bindings involved)
    pub fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Column { name } => self.dialect.quote_identifier(name),
            Expr::JsonExtract { column, path } => self
                .dialect
                .json_extract(&self.dialect.quote_identifier(column), path),
            Expr::Raw { sql } => sql.clone(),
            Expr::Lower { expr } => format!("LOWER({})", self.expr(expr)),
            Expr::Cast { expr, to } => {
                // `::` binds tighter than `->>`
                let operand = match expr.as_ref() {
                    Expr::Column { .. } => self.expr(expr),
                    other => format!("({})", self.expr(other)),
                };
                self.dialect.cast(&operand, *to)
            }
        }
    }

    /// Render a predicate with inline literals, mainly for diagnostics
    pub fn predicate_inline(&self, predicate: &Predicate) -> String {
        let mut w = SqlWriter::new(self.dialect);
        self.write_predicate(&mut w, predicate, false);
        w.raw
    }

    fn write_select(&self, w: &mut SqlWriter, query: &SelectQuery) {
        w.push("SELECT ");
        if query.projection.is_empty() {
            w.push("*");
        } else {
            let projection = query
                .projection
                .iter()
                .map(|p| self.projection(p))
                .collect::<Vec<_>>()
                .join(", ");
            w.push(&projection);
        }
        w.push(" FROM ");
        self.write_table(w, &query.table);
        self.write_joins(w, &query.joins);
        self.write_where(w, query.predicate.as_ref());

        if !query.group_by.is_empty() {
            let cols = query
                .group_by
                .iter()
                .map(|c| self.dialect.quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ");
            w.push(&format!(" GROUP BY {}", cols));
        }

        if !query.order_by.is_empty() {
            let orders = query
                .order_by
                .iter()
                .map(|o| self.order_by(o))
                .collect::<Vec<_>>()
                .join(", ");
            w.push(&format!(" ORDER BY {}", orders));
        }

        if let Some(limit) = query.limit {
            w.push(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = query.offset {
            w.push(&format!(" OFFSET {}", offset));
        }
    }

    fn projection(&self, projection: &Projection) -> String {
        let expr = self.expr(&projection.expr);
        match &projection.alias {
            Some(alias) => format!("{} AS {}", expr, self.dialect.quote_identifier(alias)),
            None => expr,
        }
    }

    fn order_by(&self, order: &OrderBy) -> String {
        format!("{} {}", self.expr(&order.expr), order.direction.as_sql())
    }

    fn write_table(&self, w: &mut SqlWriter, table: &TableRef) {
        w.push(&self.dialect.quote_identifier(&table.name));
        if let Some(alias) = &table.alias {
            w.push(" AS ");
            w.push(&self.dialect.quote_identifier(alias));
        }
    }

    fn write_joins(&self, w: &mut SqlWriter, joins: &[Join]) {
        for join in joins {
            w.push(" ");
            w.push(join.kind.as_sql());
            w.push(" ");
            self.write_table(w, &join.table);
            if let Some(on) = &join.on {
                w.push(&format!(
                    " ON {} {} {}",
                    self.expr(&on.left),
                    on.op.as_sql(),
                    self.expr(&on.right)
                ));
            }
        }
    }

    fn write_where(&self, w: &mut SqlWriter, predicate: Option<&Predicate>) {
        if let Some(p) = predicate {
            w.push(" WHERE ");
            self.write_predicate(w, p, false);
        }
    }

    fn write_predicate(&self, w: &mut SqlWriter, predicate: &Predicate, nested: bool) {
        match predicate {
            Predicate::Compare { expr, op, value } => {
                w.push(&format!("{} {} ", self.expr(expr), op.as_sql()));
                w.bind(value);
            }
            Predicate::Like {
                expr,
                pattern,
                negated,
            } => {
                let keyword = if *negated { "NOT LIKE" } else { "LIKE" };
                w.push(&format!("{} {} ", self.expr(expr), keyword));
                w.bind(&Value::String(pattern.clone()));
            }
            Predicate::InList {
                expr,
                values,
                negated,
            } => {
                let keyword = if *negated { "NOT IN" } else { "IN" };
                w.push(&format!("{} {} (", self.expr(expr), keyword));
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        w.push(", ");
                    }
                    w.bind(v);
                }
                w.push(")");
            }
            Predicate::IsNull { expr, negated } => {
                let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                w.push(&format!("{} {}", self.expr(expr), keyword));
            }
            Predicate::And { predicates } => {
                self.write_compound(w, predicates, " AND ", "1 = 1", nested)
            }
            Predicate::Or { predicates } => {
                self.write_compound(w, predicates, " OR ", "1 = 0", nested)
            }
        }
    }

    fn write_compound(
        &self,
        w: &mut SqlWriter,
        predicates: &[Predicate],
        separator: &str,
        empty: &str,
        nested: bool,
    ) {
        match predicates {
            [] => w.push(empty),
            [single] => self.write_predicate(w, single, nested),
            many => {
                if nested {
                    w.push("(");
                }
                for (i, p) in many.iter().enumerate() {
                    if i > 0 {
                        w.push(separator);
                    }
                    self.write_predicate(w, p, true);
                }
                if nested {
                    w.push(")");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CastType, CompareOp, JoinCondition, JoinKind};
    use serde_json::json;

    fn cmp(col: &str, op: CompareOp, v: Value) -> Predicate {
        Predicate::compare(Expr::column(col), op, v)
    }

    #[test]
    fn test_select_with_filters() {
        let mut q = SelectQuery::from_table(TableRef::new("orders"));
        q.filter(Predicate::and(vec![
            cmp("status", CompareOp::Eq, json!("paid")),
            cmp("total", CompareOp::Gt, json!(100)),
        ]));

        let r = SqlRenderer::new(Dialect::Postgres).render_select(&q);
        assert_eq!(
            r.sql,
            "SELECT * FROM \"orders\" WHERE \"status\" = $1 AND \"total\" > $2"
        );
        assert_eq!(
            r.raw_sql,
            "SELECT * FROM \"orders\" WHERE \"status\" = 'paid' AND \"total\" > 100"
        );
        assert_eq!(r.bindings, vec![json!("paid"), json!(100)]);
    }

    #[test]
    fn test_nested_groups_are_parenthesised() {
        let p = Predicate::or(vec![
            Predicate::and(vec![
                cmp("a", CompareOp::Eq, json!(1)),
                cmp("b", CompareOp::Eq, json!(2)),
            ]),
            cmp("c", CompareOp::Eq, json!(3)),
        ]);
        let sql = SqlRenderer::new(Dialect::Postgres).predicate_inline(&p);
        assert_eq!(sql, "(\"a\" = 1 AND \"b\" = 2) OR \"c\" = 3");

        let wrapped = Predicate::and(vec![p, Predicate::is_null(Expr::column("deleted_at"))]);
        let sql = SqlRenderer::new(Dialect::Postgres).predicate_inline(&wrapped);
        assert_eq!(
            sql,
            "((\"a\" = 1 AND \"b\" = 2) OR \"c\" = 3) AND \"deleted_at\" IS NULL"
        );
    }

    #[test]
    fn test_select_clauses_order() {
        let mut q = SelectQuery::from_table(TableRef::aliased("orders", "o"));
        q.projection = vec![
            Projection::new(Expr::column("o.id")),
            Projection::aliased(
                Expr::json("meta", vec!["info".into(), "tags".into()]),
                "meta_info_tags",
            ),
        ];
        q.joins.push(Join {
            kind: JoinKind::Left,
            table: TableRef::aliased("users", "u"),
            on: Some(JoinCondition {
                left: Expr::column("o.user_id").cast(CastType::Uuid),
                op: CompareOp::Eq,
                right: Expr::column("u.id"),
            }),
        });
        q.group_by = vec!["o.id".into()];
        q.order_by.push(OrderBy::desc(Expr::column("o.id")));
        q.limit = Some(10);
        q.offset = Some(20);

        let r = SqlRenderer::new(Dialect::Postgres).render_select(&q);
        assert_eq!(
            r.sql,
            "SELECT \"o\".\"id\", \"meta\"->'info'->>'tags' AS \"meta_info_tags\" \
             FROM \"orders\" AS \"o\" \
             LEFT JOIN \"users\" AS \"u\" ON \"o\".\"user_id\"::uuid = \"u\".\"id\" \
             GROUP BY \"o\".\"id\" ORDER BY \"o\".\"id\" DESC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_cast_of_json_path_is_parenthesised() {
        let expr = Expr::json("meta", vec!["user_ref".into()]).cast(CastType::Uuid);

        let pg = SqlRenderer::new(Dialect::Postgres).expr(&expr);
        assert_eq!(pg, "(\"meta\"->>'user_ref')::uuid");

        let join = JoinCondition {
            left: Expr::json("orders.meta", vec!["user_ref".into()]).cast(CastType::Uuid),
            op: CompareOp::Eq,
            right: Expr::column("users.id"),
        };
        let mut q = SelectQuery::from_table(TableRef::new("orders"));
        q.joins.push(Join {
            kind: JoinKind::Inner,
            table: TableRef::new("users"),
            on: Some(join),
        });
        let r = SqlRenderer::new(Dialect::Postgres).render_select(&q);
        assert!(r
            .sql
            .contains("ON (\"orders\".\"meta\"->>'user_ref')::uuid = \"users\".\"id\""));

        let sqlite = SqlRenderer::new(Dialect::Sqlite)
            .expr(&Expr::column("a").cast(CastType::Integer));
        assert_eq!(sqlite, "CAST(\"a\" AS INTEGER)");
    }

    #[test]
    fn test_count_plain_and_grouped() {
        let mut q = SelectQuery::from_table(TableRef::new("orders"));
        q.filter(cmp("status", CompareOp::Eq, json!("paid")));
        q.order_by.push(OrderBy::asc(Expr::column("id")));
        q.limit = Some(5);

        let r = SqlRenderer::new(Dialect::Postgres).render_count(&q);
        assert_eq!(
            r.sql,
            "SELECT COUNT(*) AS aggregate FROM \"orders\" WHERE \"status\" = $1"
        );

        q.group_by = vec!["customer_id".into()];
        let r = SqlRenderer::new(Dialect::Postgres).render_count(&q);
        assert_eq!(
            r.sql,
            "SELECT COUNT(*) AS aggregate FROM (SELECT * FROM \"orders\" WHERE \"status\" = $1 \
             GROUP BY \"customer_id\") AS aggregate_table"
        );
    }

    #[test]
    fn test_insert_update_delete() {
        let renderer = SqlRenderer::new(Dialect::Sqlite);

        let insert = InsertQuery {
            table: TableRef::new("orders"),
            columns: vec!["status".into(), "total".into()],
            rows: vec![vec![json!("new"), json!(5)], vec![json!("paid"), json!(7)]],
        };
        let r = renderer.render_insert(&insert);
        assert_eq!(
            r.sql,
            "INSERT INTO \"orders\" (\"status\", \"total\") VALUES (?, ?), (?, ?)"
        );
        assert_eq!(r.bindings.len(), 4);

        let update = UpdateQuery {
            table: TableRef::new("orders"),
            assignments: vec![("status".into(), json!("shipped"))],
            predicate: cmp("id", CompareOp::Eq, json!(7)),
        };
        assert_eq!(
            renderer.render_update(&update).raw_sql,
            "UPDATE \"orders\" SET \"status\" = 'shipped' WHERE \"id\" = 7"
        );

        let delete = DeleteQuery {
            table: TableRef::new("orders"),
            predicate: Predicate::InList {
                expr: Expr::column("id"),
                values: vec![json!(1), json!(2)],
                negated: true,
            },
        };
        assert_eq!(
            renderer.render_delete(&delete).sql,
            "DELETE FROM \"orders\" WHERE \"id\" NOT IN (?, ?)"
        );
    }

    #[test]
    fn test_like_and_null_rendering() {
        let p = Predicate::and(vec![
            Predicate::Like {
                expr: Expr::column("name").lower(),
                pattern: "%ann%".into(),
                negated: false,
            },
            Predicate::is_not_null(Expr::column("email")),
        ]);
        let sql = SqlRenderer::new(Dialect::Postgres).predicate_inline(&p);
        assert_eq!(
            sql,
            "LOWER(\"name\") LIKE '%ann%' AND \"email\" IS NOT NULL"
        );
    }
}
