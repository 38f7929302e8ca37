//! Typed search over registered entities
//!
//! [`EntitySearch`] is a stateless facade: it asks the engine for one page
//! of ranked ids, resolves them against the primary store in rank order and
//! decodes each record into its entity type.

use crate::results::SearchResults;
use nodwatch_core::{Entity, Error, Result};
use nodwatch_engine::{Database, ReindexReport};
use std::sync::Arc;
use tracing::debug;

/// Typed search facade
#[derive(Clone)]
pub struct EntitySearch {
    db: Arc<Database>,
}

impl EntitySearch {
    /// Create a facade over a database
    pub fn new(db: Arc<Database>) -> Self {
        EntitySearch { db }
    }

    /// Search `T` using the configured page size
    pub fn search<T: Entity>(&self, query: &str, page: usize) -> Result<SearchResults<T>> {
        self.search_page::<T>(query, page, self.db.per_page())
    }

    /// Search `T` with an explicit page size
    ///
    /// Returns `InvalidInput` for page or page size 0 and
    /// `SearchUnavailable` when the index cannot answer.
    pub fn search_page<T: Entity>(
        &self,
        query: &str,
        page: usize,
        page_size: usize,
    ) -> Result<SearchResults<T>> {
        if !self.db.registry().is_searchable(T::TYPE_NAME) {
            return Err(Error::invalid_input(format!(
                "{} is not a searchable type",
                T::TYPE_NAME
            )));
        }

        let (records, hits) = self
            .db
            .search_records(T::TYPE_NAME, query, page, page_size)?;
        let items = records
            .iter()
            .map(|record| record.decode::<T>())
            .collect::<Result<Vec<_>>>()?;

        debug!(
            target: "nodwatch::search",
            entity_type = T::TYPE_NAME,
            page,
            returned = items.len(),
            total = hits.total,
            "typed search"
        );

        Ok(SearchResults {
            items,
            total: hits.total,
            page: hits.page,
            page_size: hits.page_size,
        })
    }

    /// Rebuild the index entries of `T`
    pub fn reindex<T: Entity>(&self) -> Result<ReindexReport> {
        self.db.reindex(T::TYPE_NAME)
    }
}

impl std::fmt::Debug for EntitySearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySearch").finish_non_exhaustive()
    }
}
