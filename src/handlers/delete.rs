use serde_json::json;
use tracing::debug;

use super::{execution_error, HandlerContext, OperationHandler};
use crate::errors::{QueryError, QueryResult};
use crate::ir::Query;
use crate::operation::DeleteOp;
use crate::render::RenderedQuery;
use crate::result::{OperationResult, ResultFormatter};
use crate::store::Statement;

/// Delete handler
///
/// With `deleteColumn` set, matching rows are stamped with the current time
/// through an update instead of being removed. The result is
/// `{"rows_affected": n}` either way.
#[derive(Debug, Default)]
pub struct DeleteHandler {
    last: Option<RenderedQuery>,
}

impl DeleteHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OperationHandler for DeleteHandler {
    type Operation = DeleteOp;

    fn handle(
        &mut self,
        op: &DeleteOp,
        ctx: &mut HandlerContext<'_>,
    ) -> QueryResult<OperationResult> {
        self.last = None;
        let query = ctx
            .compiler
            .delete(op, ctx.clock.today(), ctx.clock.now())?;
        let rendered = ctx.renderer.render(&query);
        self.last = Some(rendered.clone());

        let started = ctx.clock.now();
        let affected = match &query {
            Query::Update(update) => ctx
                .store
                .update(Statement::new(ctx.connection, update, &rendered))
                .map_err(|e| execution_error("Soft delete", &update.table.name, e))?,
            Query::Delete(delete) => ctx
                .store
                .delete(Statement::new(ctx.connection, delete, &rendered))
                .map_err(|e| execution_error("Delete", &delete.table.name, e))?,
            other => {
                return Err(QueryError::unsupported_operation(format!(
                    "delete on '{}' compiled to an unexpected statement",
                    other.table().name
                )))
            }
        };
        let ended = ctx.clock.now();

        let soft = matches!(query, Query::Update(_));
        debug!(affected, soft, sql = %rendered.sql, "delete executed");
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
