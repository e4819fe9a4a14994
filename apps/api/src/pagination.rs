use serde::Deserialize;

const MAX_PAGE_SIZE: i64 = 100;

/// `?page=&page_size=` query parameters shared by every list endpoint.
/// Each endpoint picks its own default page size.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub page_size: i64,
}

impl PageQuery {
    pub fn resolve(&self, default_page_size: i64) -> Page {
        Page {
            page: self.page.unwrap_or(1).max(1),
            page_size: self
                .page_size
                .unwrap_or(default_page_size)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }
}

impl Page {
    /// Saturates, so a huge `page` yields an empty page instead of overflowing.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.page_size - 1) / self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply() {
        let page = PageQuery::default().resolve(20);
        assert_eq!(page, Page { page: 1, page_size: 20 });
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_offset_for_later_pages() {
        let page = PageQuery {
            page: Some(3),
            page_size: Some(10),
        }
        .resolve(20);
        assert_eq!(page.offset(), 20);
        assert_eq!(page.limit(), 10);
    }

    #[test]
    fn test_invalid_values_are_clamped() {
        let page = PageQuery {
            page: Some(0),
            page_size: Some(10_000),
        }
        .resolve(20);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, MAX_PAGE_SIZE);

        let page = PageQuery {
            page: Some(-4),
            page_size: Some(0),
        }
        .resolve(20);
        assert_eq!(page, Page { page: 1, page_size: 1 });
    }

    #[test]
    fn test_huge_page_saturates_offset() {
        let page = PageQuery {
            page: Some(i64::MAX),
            page_size: Some(10),
        }
        .resolve(20);
        assert_eq!(page.offset(), i64::MAX);
        assert!(page.offset() >= 0);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = PageQuery::default().resolve(10);
        assert_eq!(page.total_pages(0), 0);
        assert_eq!(page.total_pages(10), 1);
        assert_eq!(page.total_pages(11), 2);
    }
}
