use serde_json::{json, Value};
use tracing::debug;

use super::{execution_error, HandlerContext, OperationHandler};
use crate::errors::QueryResult;
use crate::operation::InsertOp;
use crate::render::RenderedQuery;
use crate::result::{OperationResult, ResultFormatter};
use crate::store::Statement;

/// Insert handler
///
/// A single-row insert reports `{"id": ...}` when the store generated a key
/// and echoes the row otherwise. A bulk insert echoes the rows.
#[derive(Debug, Default)]
pub struct InsertHandler {
    last: Option<RenderedQuery>,
}

impl InsertHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OperationHandler for InsertHandler {
    type Operation = InsertOp;

    fn handle(
        &mut self,
        op: &InsertOp,
        ctx: &mut HandlerContext<'_>,
    ) -> QueryResult<OperationResult> {
        self.last = None;
        let query = ctx.compiler.insert(op)?;
        let rendered = ctx.renderer.render_insert(&query);
        self.last = Some(rendered.clone());

        let started = ctx.clock.now();
        let outcome = ctx
            .store
            .insert(Statement::new(ctx.connection, &query, &rendered))
            .map_err(|e| execution_error("Insert", &query.table.name, e))?;
        let ended = ctx.clock.now();

        debug!(rows = outcome.rows_affected, sql = %rendered.sql, "insert executed");

        let data = op.data.clone().unwrap_or(Value::Null);
        let result = match (&data, outcome.last_insert_id) {
            (Value::Object(_), Some(id)) => json!({ "id": id }),
            _ => data,
        };
        Ok(ResultFormatter.format(result, &rendered, started, ended))
    }

    fn last_rendered(&self) -> Option<&RenderedQuery> {
        self.last.as_ref()
    }
}
