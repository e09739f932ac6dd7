//! Store collaborator
//!
//! The executor talks to the relational store only through the `Store`
//! trait. Each call receives the compiled IR together with its rendered
//! SQL, so a SQL driver can execute `rendered` while `MemoryStore`
//! evaluates the IR directly.

mod eval;
mod memory;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::ir::{DeleteQuery, InsertQuery, SelectQuery, UpdateQuery};
use crate::render::{Dialect, RenderedQuery};

pub use memory::{MemoryStore, StoreStats};

/// One result row, keyed by output column
pub type Row = Map<String, Value>;

/// Result type for store calls
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Query error: {0}")]
    Query(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Unsupported by store: {0}")]
    Unsupported(String),
}

/// A compiled statement handed to the store
#[derive(Debug, Clone, Copy)]
pub struct Statement<'a, Q> {
    pub connection: &'a str,
    pub query: &'a Q,
    pub rendered: &'a RenderedQuery,
}

impl<'a, Q> Statement<'a, Q> {
    pub fn new(connection: &'a str, query: &'a Q, rendered: &'a RenderedQuery) -> Self {
        Self {
            connection,
            query,
            rendered,
        }
    }
}

/// Outcome of an insert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOutcome {
    pub rows_affected: u64,
    /// Key generated by the store for the last inserted row
    pub last_insert_id: Option<Value>,
}

/// A relational store reachable through named connections
pub trait Store {
    /// Dialect this store requires, if it imposes one
    fn dialect(&self) -> Option<Dialect> {
        None
    }

    fn select(&mut self, stmt: Statement<'_, SelectQuery>) -> StoreResult<Vec<Row>>;

    fn count(&mut self, stmt: Statement<'_, SelectQuery>) -> StoreResult<u64>;

    fn insert(&mut self, stmt: Statement<'_, InsertQuery>) -> StoreResult<InsertOutcome>;

    /// Returns the number of rows affected
    fn update(&mut self, stmt: Statement<'_, UpdateQuery>) -> StoreResult<u64>;

    /// Returns the number of rows affected
    fn delete(&mut self, stmt: Statement<'_, DeleteQuery>) -> StoreResult<u64>;

    fn begin(&mut self, connection: &str) -> StoreResult<()>;

    fn commit(&mut self, connection: &str) -> StoreResult<()>;

    fn rollback(&mut self, connection: &str) -> StoreResult<()>;
}
