//! Select handler, including both pagination strategies.

use tracing::debug;

use super::{execution_error, HandlerContext, OperationHandler};
use crate::errors::QueryResult;
use crate::ir::SelectQuery;
use crate::operation::{Pagination, SelectOp};
use crate::pagination::{CursorPaginator, OffsetPaginator};
use crate::render::RenderedQuery;
use crate::result::{OperationResult, ResultFormatter};
use crate::store::Statement;

#[derive(Debug, Default)]
pub struct SelectHandler {
    last: Option<RenderedQuery>,
}

impl SelectHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn plain(
        &mut self,
        query: SelectQuery,
        ctx: &mut HandlerContext<'_>,
    ) -> QueryResult<OperationResult> {
        let rendered = self.remember(ctx.renderer.render_select(&query));

        let started = ctx.clock.now();
        let rows = ctx
            .store
            .select(Statement::new(ctx.connection, &query, &rendered))
            .map_err(|e| execution_error("Select", &query.table.name, e))?;
        let ended = ctx.clock.now();

        debug!(rows = rows.len(), sql = %rendered.sql, "select executed");
        Ok(ResultFormatter.format_rows(rows, &rendered, started, ended))
    }

    fn offset(
        &mut self,
        mut query: SelectQuery,
        page: u64,
        per_page: u64,
        ctx: &mut HandlerContext<'_>,
    ) -> QueryResult<OperationResult> {
        let paginator = OffsetPaginator::new(page, per_page, ctx.config.max_per_page)?;
        let table = query.table.name.clone();

        let count_rendered = ctx.renderer.render_count(&query);
        let started = ctx.clock.now();
        let total = ctx
            .store
            .count(Statement::new(ctx.connection, &query, &count_rendered))
            .map_err(|e| execution_error("Count", &table, e))?;

        paginator.apply(&mut query);
        let rendered = self.remember(ctx.renderer.render_select(&query));
        let rows = ctx
            .store
            .select(Statement::new(ctx.connection, &query, &rendered))
            .map_err(|e| execution_error("Select", &table, e))?;
        let ended = ctx.clock.now();

        debug!(total, page, per_page, sql = %rendered.sql, "offset page fetched");
        Ok(ResultFormatter.format_page(rows, paginator.meta(total), &rendered, started, ended))
    }

    fn cursor(
        &mut self,
        mut query: SelectQuery,
        paginator: CursorPaginator,
        ctx: &mut HandlerContext<'_>,
    ) -> QueryResult<OperationResult> {
        let plan = paginator.prepare(&mut query, ctx.compiler.resolver())?;
        let rendered = self.remember(ctx.renderer.render_select(&query));

        let started = ctx.clock.now();
        let rows = ctx
            .store
            .select(Statement::new(ctx.connection, &query, &rendered))
            .map_err(|e| execution_error("Select", &query.table.name, e))?;
        let ended = ctx.clock.now();

        let (rows, meta) = paginator.finish(&plan, rows);
        debug!(rows = rows.len(), sql = %rendered.sql, "cursor page fetched");
        Ok(ResultFormatter.format_page(rows, meta, &rendered, started, ended))
    }

    fn remember(&mut self, rendered: RenderedQuery) -> RenderedQuery {
        self.last = Some(rendered.clone());
        rendered
    }
}

impl OperationHandler for SelectHandler {
    type Operation = SelectOp;

    fn handle(
        &mut self,
        op: &SelectOp,
        ctx: &mut HandlerContext<'_>,
    ) -> QueryResult<OperationResult> {
        self.last = None;
        let query = ctx.compiler.select(op, ctx.clock.today())?;

        match &op.pagination {
            None => self.plain(query, ctx),
            Some(Pagination::Offset { page, per_page }) => {
                self.offset(query, *page, *per_page, ctx)
            }
            Some(Pagination::Cursor {
                cursor,
                limit,
                cursor_column,
            }) => {
                let column = cursor_column
                    .clone()
                    .unwrap_or_else(|| ctx.config.primary_key.clone());
                let paginator = CursorPaginator::new(
                    cursor.as_deref(),
                    *limit,
                    column,
                    ctx.config.max_per_page,
                )?;
                self.cursor(query, paginator, ctx)
            }
        }
    }

    fn last_rendered(&self) -> Option<&RenderedQuery> {
        self.last.as_ref()
    }
}
