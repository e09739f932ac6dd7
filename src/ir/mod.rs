//! # Query IR
//!
//! Dialect-neutral representation of a compiled operation. The compiler
//! produces these values, the renderer turns them into SQL text, and stores
//! that cannot execute SQL (such as the in-memory store) evaluate them
//! directly.

mod expr;
mod predicate;
mod query;

pub use expr::{CastType, Expr};
pub use predicate::{CompareOp, Predicate};
pub use query::{
    DeleteQuery, InsertQuery, Join, JoinCondition, JoinKind, OrderBy, Projection, Query,
    SelectQuery, SortDirection, TableRef, UpdateQuery,
};

pub(crate) use query::unqualified;
