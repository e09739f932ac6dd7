//! relop - declarative relational operations
//!
//! Turns JSON-shaped descriptors of reads and writes (table, boolean filter
//! tree, sorts, joins, group-by, pagination, JSON-path attributes) into
//! dialect-specific SQL, runs them through a [`store::Store`] and returns a
//! uniform result envelope with timing and pagination metadata.
//!
//! ```text
//! descriptor JSON -> operation -> compiler -> ir -> render -> store
//!                                                        \-> result envelope
//! ```

pub mod cli;
pub mod clock;
pub mod compiler;
pub mod config;
pub mod errors;
pub mod executor;
pub mod filter;
pub mod handlers;
pub mod ir;
pub mod operation;
pub mod pagination;
pub mod render;
pub mod result;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ExecutorConfig;
pub use errors::{QueryError, QueryResult};
pub use executor::{OperationExecutor, QueryLogEntry};
pub use operation::Operation;
pub use result::OperationResult;
pub use store::{MemoryStore, Store, StoreError};
