//! Page-number pagination.

use crate::errors::{QueryError, QueryResult};
use crate::ir::SelectQuery;
use crate::result::PaginationMeta;

/// Offset paginator for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetPaginator {
    page: u64,
    per_page: u64,
}

impl OffsetPaginator {
    /// Validate `page >= 1` and `1 <= per_page <= max_per_page`
    pub fn new(page: u64, per_page: u64, max_per_page: u64) -> QueryResult<Self> {
        if page == 0 {
            return Err(QueryError::invalid_argument("page must be >= 1"));
        }
        if per_page == 0 || per_page > max_per_page {
            return Err(QueryError::invalid_argument(format!(
                "per_page must be between 1 and {}",
                max_per_page
            )));
        }
        Ok(Self { page, per_page })
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    /// Window the query onto the requested page
    pub fn apply(&self, query: &mut SelectQuery) {
        query.limit = Some(self.per_page);
        query.offset = Some((self.page - 1).saturating_mul(self.per_page));
    }

    /// Metadata for a page given the total row count
    pub fn meta(&self, total: u64) -> PaginationMeta {
        let total_pages = total.div_ceil(self.per_page);
        PaginationMeta::Offset {
            count: total,
            per_page: self.per_page,
            current_page: self.page,
            total_pages,
            has_more: self.page < total_pages,
        }
    }
}
