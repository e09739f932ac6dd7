//! Operation executor
//!
//! Takes an ordered batch of operation descriptors, decides the transaction
//! scope, dispatches each operation to its handler and collects the result
//! envelopes in submitted order.
//!
//! # Guarantees
//!
//! - A batch of two or more operations runs inside exactly one transaction
//!   per connection it touches
//! - A single `select` or `count` never opens a transaction
//! - On error every opened transaction is rolled back before the error is
//!   returned, unchanged
//! - No store call is made for an operation that fails validation

mod executor;

pub use executor::{needs_transaction, OperationExecutor, QueryLogEntry};
