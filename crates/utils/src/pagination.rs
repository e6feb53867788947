//! Page/per-page query parameters shared by listing routes.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// Deserialized straight from a route's query string. Raw values are
/// untrusted; `limit()`/`offset()` apply the clamped view.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// A page of results plus enough metadata for the client to render
/// pagination controls and empty states.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl<T> Paged<T> {
    pub fn new(items: Vec<T>, pagination: Pagination, total: i64) -> Self {
        Self {
            items,
            page: pagination.page(),
            per_page: pagination.limit(),
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let p = Pagination::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), DEFAULT_PER_PAGE);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn page_and_per_page_are_clamped() {
        let p = Pagination {
            page: Some(0),
            per_page: Some(10_000),
        };
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), MAX_PER_PAGE);

        let p = Pagination {
            page: Some(-3),
            per_page: Some(0),
        };
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), 1);
    }

    #[test]
    fn offset_is_derived_from_clamped_values() {
        let p = Pagination {
            page: Some(3),
            per_page: Some(25),
        };
        assert_eq!(p.offset(), 50);
    }
}
