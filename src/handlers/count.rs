use serde_json::json;
use tracing::debug;

use super::{execution_error, HandlerContext, OperationHandler};
use crate::errors::QueryResult;
use crate::operation::CountOp;
use crate::render::RenderedQuery;
use crate::result::{OperationResult, ResultFormatter};
use crate::store::Statement;

/// Count handler; the result is `{"count": n}`
#[derive(Debug, Default)]
pub struct CountHandler {
    last: Option<RenderedQuery>,
}

impl CountHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OperationHandler for CountHandler {
    type Operation = CountOp;

    fn handle(
        &mut self,
        op: &CountOp,
        ctx: &mut HandlerContext<'_>,
    ) -> QueryResult<OperationResult> {
        self.last = None;
        let query = ctx.compiler.count(op, ctx.clock.today())?;
        let rendered = ctx.renderer.render_count(&query);
        self.last = Some(rendered.clone());

        let started = ctx.clock.now();
        let count = ctx
            .store
            .count(Statement::new(ctx.connection, &query, &rendered))
            .map_err(|e| execution_error("Count", &query.table.name, e))?;
        let ended = ctx.clock.now();

        debug!(count, sql = %rendered.sql, "count executed");
        Ok(ResultFormatter.format(json!({ "count": count }), &rendered, started, ended))
    }

    fn last_rendered(&self) -> Option<&RenderedQuery> {
        self.last.as_ref()
    }
}
