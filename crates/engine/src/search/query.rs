//! Query adapter
//!
//! Translates a free-text search into an index query returning a page of
//! ids plus the total match count. Records are then fetched from the
//! primary store and put back into index order; the index never supplies
//! the data that gets displayed.

use super::memory::SearchIndex;
use nodwatch_core::{EntityId, Error, Record, RecordSource, Result};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// One page of ranked ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Ids in relevance order
    pub ids: Vec<EntityId>,
    /// Matches across all pages
    pub total: usize,
    /// 1-based page number
    pub page: usize,
    /// Requested page size
    pub page_size: usize,
}

impl SearchPage {
    /// True if nothing matched
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Runs searches against a [`SearchIndex`]
#[derive(Clone)]
pub struct QueryAdapter {
    index: Arc<dyn SearchIndex>,
}

impl QueryAdapter {
    /// Create an adapter over an index
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        QueryAdapter { index }
    }

    /// Ranked ids for one page
    ///
    /// `page` is 1-based. Index failures become `SearchUnavailable`, never
    /// an empty page.
    pub fn search(
        &self,
        entity_type: &str,
        query: &str,
        page: usize,
        page_size: usize,
    ) -> Result<SearchPage> {
        if page == 0 {
            return Err(Error::invalid_input("page numbers start at 1"));
        }
        if page_size == 0 {
            return Err(Error::invalid_input("page size must be at least 1"));
        }

        let hits = self.index.query(entity_type, query, page, page_size)?;
        Ok(SearchPage {
            ids: hits.ids,
            total: hits.total,
            page,
            page_size,
        })
    }
}

/// Fetch records by id and return them in the order of `ids`
///
/// An empty `ids` returns without touching `source`. Ids with no record
/// (stale index entries) are dropped.
pub fn resolve_in_order(
    source: &dyn RecordSource,
    entity_type: &str,
    ids: &[EntityId],
) -> Result<Vec<Record>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut by_id: FxHashMap<EntityId, Record> = source
        .fetch_many(entity_type, ids)?
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect();

    let mut ordered = Vec::with_capacity(ids.len());
    for id in ids {
        match by_id.remove(id) {
            Some(record) => ordered.push(record),
            None => debug!(
                target: "nodwatch::search",
                entity_type,
                id = %id,
                "index returned an id missing from the store"
            ),
        }
    }
    Ok(ordered)
}
