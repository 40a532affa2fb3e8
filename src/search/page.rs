use crate::types::Record;
use serde::Serialize;

/// One page of search results.
///
/// Ranked, keyword and unfiltered searches all produce this same shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub items: Vec<Record>,
    /// 1-based page actually served
    pub page: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub num_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl SearchPage {
    /// Slices `records` into the requested page.
    ///
    /// Pages below 1 serve page 1 and pages past the end serve the last
    /// page. An empty result still has one (empty) page.
    pub fn paginate(records: Vec<Record>, page: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let total_count = records.len();
        let num_pages = total_count.div_ceil(page_size).max(1);
        let page = page.clamp(1, num_pages);

        let items = records
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();

        Self {
            items,
            page,
            page_size,
            total_count,
            num_pages,
            has_next: page < num_pages,
            has_previous: page > 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
