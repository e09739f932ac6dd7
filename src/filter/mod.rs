//! # Filter AST
//!
//! Declarative boolean filter trees attached to select, update, delete and
//! count operations. Trees are validated once, when they are parsed from
//! their JSON shape; everything downstream works on the typed nodes.

mod ast;

pub use ast::{Combinator, FilterCondition, FilterGroup, FilterNode, FilterOperator};
