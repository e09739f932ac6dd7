//! Pagination strategies
//!
//! Both strategies are pure: they reshape the `SelectQuery` before it
//! reaches the store and turn the fetched rows into `PaginationMeta`.
//! The select handler owns the store calls.

mod cursor;
mod offset;

pub use cursor::{Cursor, CursorPaginator, CursorPlan};
pub use offset::OffsetPaginator;
