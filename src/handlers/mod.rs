//! # Operation Handlers
//!
//! One handler per operation kind. Each one compiles its descriptor,
//! renders the statement, calls the store with timing around the call and
//! wraps the outcome in an `OperationResult`.
//!
//! Handlers remember the last statement they rendered so the executor can
//! record it in its query log.

mod count;
mod delete;
mod insert;
mod select;
mod update;

use crate::clock::Clock;
use crate::compiler::OperationCompiler;
use crate::config::ExecutorConfig;
use crate::errors::{QueryError, QueryResult};
use crate::render::{RenderedQuery, SqlRenderer};
use crate::result::OperationResult;
use crate::store::{Store, StoreError};

pub use count::CountHandler;
pub use delete::DeleteHandler;
pub use insert::InsertHandler;
pub use select::SelectHandler;
pub use update::UpdateHandler;

/// Everything a handler needs for one operation
pub struct HandlerContext<'a> {
    pub store: &'a mut dyn Store,
    pub clock: &'a dyn Clock,
    pub compiler: &'a OperationCompiler,
    pub renderer: SqlRenderer,
    pub config: &'a ExecutorConfig,
    /// Resolved connection name
    pub connection: &'a str,
}

/// Contract shared by the per-kind handlers
pub trait OperationHandler {
    type Operation;

    fn handle(
        &mut self,
        operation: &Self::Operation,
        ctx: &mut HandlerContext<'_>,
    ) -> QueryResult<OperationResult>;

    /// Statement rendered by the most recent `handle` call
    fn last_rendered(&self) -> Option<&RenderedQuery>;
}

/// Wrap a store error with the statement kind and table
pub(crate) fn execution_error(action: &str, table: &str, err: StoreError) -> QueryError {
    QueryError::execution(format!("{} on '{}' failed", action, table), err)
}
