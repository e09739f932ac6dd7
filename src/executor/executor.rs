//! Batch executor and transaction coordinator
//!
//! Execution flow:
//! 1. Decide whether the batch needs a transaction
//! 2. Begin one transaction per distinct connection, in first-use order
//! 3. Dispatch each operation to its handler, strictly in submitted order
//! 4. Commit on success, roll back everything on the first error
//!
//! A single `select` or `count` runs without a transaction. Anything else,
//! and every batch of two or more operations, runs inside one.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::compiler::OperationCompiler;
use crate::config::ExecutorConfig;
use crate::errors::{QueryError, QueryResult};
use crate::handlers::{
    CountHandler, DeleteHandler, HandlerContext, InsertHandler, OperationHandler, SelectHandler,
    UpdateHandler,
};
use crate::operation::Operation;
use crate::render::{RenderedQuery, SqlRenderer};
use crate::result::OperationResult;
use crate::store::Store;

/// One executed statement; times are epoch seconds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryLogEntry {
    pub sql: String,
    pub bindings: Vec<Value>,
    pub started_at: f64,
    pub ended_at: f64,
}

#[derive(Debug, Default)]
struct Handlers {
    select: SelectHandler,
    count: CountHandler,
    insert: InsertHandler,
    update: UpdateHandler,
    delete: DeleteHandler,
}

/// Runs operation batches against a store
///
/// Meant to be used for one request and then dropped; the query log grows
/// with every executed operation until `clear_query_log` is called.
pub struct OperationExecutor<S: Store> {
    store: S,
    config: ExecutorConfig,
    clock: Box<dyn Clock>,
    compiler: OperationCompiler,
    renderer: SqlRenderer,
    handlers: Handlers,
    query_log: Vec<QueryLogEntry>,
}

impl<S: Store> OperationExecutor<S> {
    /// Creates an executor using the wall clock
    ///
    /// The store's dialect wins over the configured one.
    pub fn new(store: S, config: ExecutorConfig) -> Self {
        let dialect = store.dialect().unwrap_or(config.dialect);
        Self {
            compiler: OperationCompiler::new(&config.json_path_separator),
            renderer: SqlRenderer::new(dialect),
            store,
            config,
            clock: Box::new(SystemClock),
            handlers: Handlers::default(),
            query_log: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Entries for every operation executed so far
    pub fn query_log(&self) -> &[QueryLogEntry] {
        &self.query_log
    }

    pub fn clear_query_log(&mut self) {
        self.query_log.clear();
    }

    /// Parse a JSON batch (array or single object) and run it
    pub fn run_json(&mut self, batch: &Value) -> QueryResult<Vec<OperationResult>> {
        let operations = Operation::parse_batch(batch)?;
        self.run(&operations)
    }

    /// Run a batch; results come back in submitted order
    ///
    /// A one-operation batch yields a one-element vector.
    pub fn run(&mut self, operations: &[Operation]) -> QueryResult<Vec<OperationResult>> {
        let transactional = needs_transaction(operations);
        info!(
            operation_count = operations.len(),
            transaction = transactional,
            "executing operation batch"
        );

        if !transactional {
            return operations.iter().map(|op| self.dispatch(op)).collect();
        }

        let connections = self.connections(operations);
        let mut opened = Vec::with_capacity(connections.len());
        for connection in &connections {
            if let Err(e) = self.store.begin(connection) {
                self.rollback_all(&opened);
                return Err(QueryError::execution(
                    format!("Begin transaction on '{}' failed", connection),
                    e,
                ));
            }
            opened.push(connection.clone());
        }

        let mut results = Vec::with_capacity(operations.len());
        for op in operations {
            match self.dispatch(op) {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(
                        operation_type = op.kind().as_str(),
                        error = %e,
                        "operation failed, rolling back"
                    );
                    self.rollback_all(&opened);
                    return Err(e);
                }
            }
        }

        for (i, connection) in opened.iter().enumerate() {
            if let Err(e) = self.store.commit(connection) {
                self.rollback_all(&opened[i + 1..]);
                return Err(QueryError::execution(
                    format!("Commit on '{}' failed", connection),
                    e,
                ));
            }
        }
        debug!(connections = opened.len(), "batch committed");
        Ok(results)
    }

    /// Compile a batch without touching the store
    pub fn compile(&self, operations: &[Operation]) -> QueryResult<Vec<RenderedQuery>> {
        operations
            .iter()
            .map(|op| {
                let query = self.compiler.compile(op, self.clock.as_ref())?;
                Ok(self.renderer.render(&query))
            })
            .collect()
    }

    fn dispatch(&mut self, op: &Operation) -> QueryResult<OperationResult> {
        let connection = self.config.connection(op.connection()).to_string();
        info!(
            operation_type = op.kind().as_str(),
            connection = %connection,
            table = op.table_name(),
            "executing operation"
        );

        let mut ctx = HandlerContext {
            store: &mut self.store,
            clock: self.clock.as_ref(),
            compiler: &self.compiler,
            renderer: self.renderer,
            config: &self.config,
            connection: &connection,
        };

        let (result, rendered) = match op {
            Operation::Select(o) => run_handler(&mut self.handlers.select, o, &mut ctx),
            Operation::Count(o) => run_handler(&mut self.handlers.count, o, &mut ctx),
            Operation::Insert(o) => run_handler(&mut self.handlers.insert, o, &mut ctx),
            Operation::Update(o) => run_handler(&mut self.handlers.update, o, &mut ctx),
            Operation::Delete(o) => run_handler(&mut self.handlers.delete, o, &mut ctx),
        };
        let result = result?;

        if let Some(rendered) = rendered {
            debug!(sql = %rendered.sql, "operation succeeded");
            self.query_log.push(QueryLogEntry {
                sql: rendered.sql,
                bindings: rendered.bindings,
                started_at: result.timing.started_at,
                ended_at: result.timing.ended_at,
            });
        }
        Ok(result)
    }

    /// Distinct resolved connections in first-use order
    fn connections(&self, operations: &[Operation]) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for op in operations {
            let name = self.config.connection(op.connection());
            if !seen.iter().any(|c| c == name) {
                seen.push(name.to_string());
            }
        }
        seen
    }

    /// Roll back in reverse begin order; failures are logged, not returned
    fn rollback_all(&mut self, connections: &[String]) {
        for connection in connections.iter().rev() {
            match self.store.rollback(connection) {
                Ok(()) => info!(connection = %connection, "transaction rolled back"),
                Err(e) => error!(connection = %connection, error = %e, "rollback failed"),
            }
        }
    }
}

fn run_handler<H: OperationHandler>(
    handler: &mut H,
    op: &H::Operation,
    ctx: &mut HandlerContext<'_>,
) -> (QueryResult<OperationResult>, Option<RenderedQuery>) {
    let result = handler.handle(op, ctx);
    (result, handler.last_rendered().cloned())
}

/// More than one operation, or a single write
pub fn needs_transaction(operations: &[Operation]) -> bool {
    match operations {
        [] => false,
        [single] => !single.kind().is_read_only(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::{MemoryStore, StoreError};
    use serde_json::json;

    fn seeded() -> MemoryStore {
        MemoryStore::from_value(&json!({
            "orders": [
                {"id": 1, "status": "paid", "total": 150},
                {"id": 2, "status": "paid", "total": 50},
                {"id": 3, "status": "open", "total": 300}
            ]
        }))
        .unwrap()
    }

    fn executor(store: MemoryStore) -> OperationExecutor<MemoryStore> {
        OperationExecutor::new(store, ExecutorConfig::default())
            .with_clock(FixedClock::at_date(2024, 5, 15).unwrap())
    }

    fn ops(value: serde_json::Value) -> Vec<Operation> {
        Operation::parse_batch(&value).unwrap()
    }

    #[test]
    fn test_needs_transaction() {
        let select = ops(json!([{"type": "select", "tableName": "orders"}]));
        let count = ops(json!([{"type": "count", "tableName": "orders"}]));
        let insert = ops(json!([{"type": "insert", "tableName": "orders", "data": {"id": 9}}]));
        let two = ops(json!([
            {"type": "select", "tableName": "orders"},
            {"type": "select", "tableName": "orders"}
        ]));

        assert!(!needs_transaction(&[]));
        assert!(!needs_transaction(&select));
        assert!(!needs_transaction(&count));
        assert!(needs_transaction(&insert));
        assert!(needs_transaction(&two));
    }

    #[test]
    fn test_single_select_runs_without_transaction() {
        let mut ex = executor(seeded());
        let results = ex
            .run(&ops(json!({"type": "select", "tableName": "orders"})))
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rows().unwrap().len(), 3);
        assert_eq!(ex.store().stats().begins, 0);
        assert_eq!(ex.store().stats().commits, 0);
    }

    #[test]
    fn test_failed_batch_rolls_back() {
        let mut ex = executor(seeded().fail_on("audit"));
        let err = ex
            .run(&ops(json!([
                {"type": "delete", "tableName": "orders", "filters": {
                    "op": "and",
                    "conditions": [{"attribute": "id", "operator": "is", "value": 1}]
                }},
                {"type": "insert", "tableName": "audit", "data": {"event": "deleted"}}
            ])))
            .unwrap_err();

        assert_eq!(err.code(), "EXECUTION_FAILURE");
        let stats = ex.store().stats();
        assert_eq!(stats.begins, 1);
        assert_eq!(stats.rollbacks, 1);
        assert_eq!(stats.commits, 0);
        assert_eq!(ex.store().table("orders").unwrap().len(), 3);
        assert!(!ex.store().in_transaction());
    }

    #[test]
    fn test_one_transaction_per_connection() {
        let mut ex = executor(seeded());
        ex.run(&ops(json!([
            {"type": "insert", "tableName": "orders", "data": {"status": "open", "total": 1}},
            {"type": "insert", "tableName": "orders", "connection": "reporting",
             "data": {"status": "open", "total": 2}},
            {"type": "count", "tableName": "orders", "connection": "default"}
        ])))
        .unwrap();

        assert_eq!(ex.store().stats().begins, 2);
        assert_eq!(ex.store().stats().commits, 2);
    }

    #[test]
    fn test_query_log_records_each_operation() {
        let mut ex = executor(seeded());
        ex.run(&ops(json!([
            {"type": "count", "tableName": "orders"},
            {"type": "select", "tableName": "orders", "attributes": ["id"]}
        ])))
        .unwrap();

        let log = ex.query_log();
        assert_eq!(log.len(), 2);
        assert!(log[0].sql.starts_with("SELECT COUNT(*)"));
        assert!(log[1].sql.contains("\"orders\""));

        ex.clear_query_log();
        assert!(ex.query_log().is_empty());
    }

    #[test]
    fn test_compile_does_not_touch_store() {
        let ex = executor(seeded());
        let rendered = ex
            .compile(&ops(json!([
                {"type": "select", "tableName": "orders"},
                {"type": "delete", "tableName": "orders", "filters": {
                    "op": "and",
                    "conditions": [{"attribute": "id", "operator": "is", "value": 7}]
                }}
            ])))
            .unwrap();

        assert_eq!(rendered.len(), 2);
        assert!(rendered[1].sql.starts_with("DELETE FROM"));
        assert_eq!(rendered[1].bindings, vec![json!(7)]);
        assert_eq!(ex.store().stats().statements(), 0);
    }

    #[test]
    fn test_execution_failure_keeps_source() {
        let mut ex = executor(seeded().fail_on("orders"));
        let err = ex
            .run(&ops(json!({"type": "select", "tableName": "orders"})))
            .unwrap_err();

        match err {
            QueryError::ExecutionFailure { source, .. } => {
                assert!(matches!(source, StoreError::Query(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
