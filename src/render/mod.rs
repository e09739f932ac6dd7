//! # SQL Rendering
//!
//! Turns the dialect-neutral query IR into SQL text for one dialect.
//!
//! Every render produces two texts: `sql`, with positional placeholders and
//! an ordered `bindings` list, and `raw_sql`, with the bound values inlined
//! as literals for logging and debugging.

mod dialect;
mod sql;

pub use dialect::Dialect;
pub use sql::{RenderedQuery, SqlRenderer};
