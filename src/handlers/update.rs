use serde_json::json;
use tracing::debug;

use super::{execution_error, HandlerContext, OperationHandler};
use crate::errors::QueryResult;
use crate::operation::UpdateOp;
use crate::render::RenderedQuery;
use crate::result::{OperationResult, ResultFormatter};
use crate::store::Statement;

/// Update handler; the result is `{"rows_affected": n}`
#[derive(Debug, Default)]
pub struct UpdateHandler {
    last: Option<RenderedQuery>,
}

impl UpdateHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OperationHandler for UpdateHandler {
    type Operation = UpdateOp;

    fn handle(
        &mut self,
        op: &UpdateOp,
        ctx: &mut HandlerContext<'_>,
    ) -> QueryResult<OperationResult> {
        self.last = None;
        let query = ctx.compiler.update(op, ctx.clock.today())?;
        let rendered = ctx.renderer.render_update(&query);
        self.last = Some(rendered.clone());

        let started = ctx.clock.now();
        let affected = ctx
            .store
            .update(Statement::new(ctx.connection, &query, &rendered))
            .map_err(|e| execution_error("Update", &query.table.name, e))?;
        let ended = ctx.clock.now();

        debug!(affected, sql = %rendered.sql, "update executed");
        Ok(ResultFormatter.format(
            json!({ "rows_affected": affected }),
            &rendered,
            started,
            ended,
        ))
    }

    fn last_rendered(&self) -> Option<&RenderedQuery> {
        self.last.as_ref()
    }
}
