//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Pagination parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl Pagination {
    pub const MAX_PER_PAGE: u32 = 100;

    /// Build from optional query values, clamping to sane bounds
    pub fn from_query(page: Option<u32>, per_page: Option<u32>) -> Self {
        let defaults = Self::default();
        Self {
            page: page.unwrap_or(defaults.page).max(1),
            per_page: per_page
                .unwrap_or(defaults.per_page)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(pagination: Pagination, total_items: u64) -> Self {
        let per_page = u64::from(pagination.per_page.max(1));
        Self {
            page: pagination.page,
            per_page: pagination.per_page,
            total_items,
            total_pages: total_items.div_ceil(per_page) as u32,
        }
    }
}

/// Body of every status PATCH endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateInput {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination::from_query(Some(0), Some(1000));
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, Pagination::MAX_PER_PAGE);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_offset() {
        let p = Pagination::from_query(Some(3), Some(20));
        assert_eq!(p.offset(), 40);
        assert_eq!(p.limit(), 20);
    }

    #[test]
    fn test_pagination_meta_total_pages() {
        let meta = PaginationMeta::new(Pagination::from_query(Some(1), Some(20)), 41);
        assert_eq!(meta.total_pages, 3);
        let empty = PaginationMeta::new(Pagination::default(), 0);
        assert_eq!(empty.total_pages, 0);
    }
}
