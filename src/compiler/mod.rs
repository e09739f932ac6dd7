//! Compilation of operation descriptors into the query IR.
//!
//! - `json_path`: attribute and JSON-path resolution, projection aliases
//! - `presets`: relative date presets
//! - `predicate`: filter tree compilation
//! - `join`: join validation and type coercion
//! - `operation`: whole descriptors into IR statements

mod join;
mod json_path;
mod operation;
mod predicate;
mod presets;

pub use join::JoinCompiler;
pub use json_path::{is_aggregate, is_sql_expression, JsonPathResolver, DEFAULT_SEPARATOR};
pub use operation::OperationCompiler;
pub use predicate::PredicateCompiler;
pub use presets::{parse_literal_range, resolve_preset, DatePreset, DateRange};
