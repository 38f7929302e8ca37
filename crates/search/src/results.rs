//! Typed result pages

use nodwatch_core::Stored;

/// One page of typed search results, in rank order
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults<T> {
    /// Entities of this page, resolved from the primary store
    pub items: Vec<Stored<T>>,
    /// Total number of matches across all pages
    pub total: usize,
    /// 1-based page number
    pub page: usize,
    /// Requested page size
    pub page_size: usize,
}

impl<T> SearchResults<T> {
    /// An empty page
    pub fn empty(page: usize, page_size: usize) -> Self {
        SearchResults {
            items: Vec::new(),
            total: 0,
            page,
            page_size,
        }
    }

    /// Number of entities on this page
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if this page holds no entities
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether matches remain past this page
    pub fn has_next(&self) -> bool {
        self.total > self.page.saturating_mul(self.page_size)
    }

    /// Whether there is a page before this one
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Number of the next page, if any
    pub fn next_page(&self) -> Option<usize> {
        self.has_next().then(|| self.page + 1)
    }

    /// Number of the previous page, if any
    pub fn prev_page(&self) -> Option<usize> {
        self.has_prev().then(|| self.page - 1)
    }

    /// Total number of pages
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        (self.total + self.page_size - 1) / self.page_size
    }

    /// Iterate the typed values
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|s| &s.value)
    }
}

impl<T> IntoIterator for SearchResults<T> {
    type Item = Stored<T>;
    type IntoIter = std::vec::IntoIter<Stored<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
