//! Typed search orchestration for Nodwatch.
//!
//! The engine answers searches with ranked ids; this crate turns them into
//! pages of typed entities with next/previous navigation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod results;
pub mod typed;

use std::sync::Arc;
use nodwatch_engine::Database;

pub use results::SearchResults;
pub use typed::EntitySearch;

/// Extension trait for Database to provide typed search.
pub trait DatabaseSearchExt {
    /// Get the typed search interface
    fn entity_search(&self) -> EntitySearch;
}

impl DatabaseSearchExt for Arc<Database> {
    fn entity_search(&self) -> EntitySearch {
        EntitySearch::new(Arc::clone(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodwatch_core::{Entity, Error, SearchDescriptor};
    use nodwatch_engine::{DatabaseBuilder, NodwatchConfig};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    impl Entity for Note {
        const TYPE_NAME: &'static str = "note";

        fn descriptor() -> Option<SearchDescriptor> {
            Some(SearchDescriptor::new(Self::TYPE_NAME, ["text"]))
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Secret {
        text: String,
    }

    impl Entity for Secret {
        const TYPE_NAME: &'static str = "secret";
    }

    fn db_with_per_page(per_page: usize) -> Arc<Database> {
        let mut config = NodwatchConfig::default();
        config.search.per_page = per_page;
        Arc::new(
            DatabaseBuilder::new()
                .config(config)
                .register::<Note>()
                .register::<Secret>()
                .build()
                .unwrap(),
        )
    }

    fn seed(db: &Database, n: usize) {
        db.transaction(|txn| {
            for i in 0..n {
                txn.insert_entity(&Note {
                    text: format!("test note {}", i),
                })?;
            }
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_typed_pages_use_configured_size() {
        let db = db_with_per_page(10);
        seed(&db, 25);

        let search = db.entity_search();
        let first = search.search::<Note>("test", 1).unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first.total, 25);
        assert_eq!(first.next_page(), Some(2));
        assert!(first.items.iter().all(|n| n.text.starts_with("test note")));

        let last = search.search::<Note>("test", 3).unwrap();
        assert_eq!(last.len(), 5);
        assert_eq!(last.next_page(), None);
        assert_eq!(last.prev_page(), Some(2));
    }

    #[test]
    fn test_no_matches() {
        let db = db_with_per_page(25);
        seed(&db, 3);

        let results = db.entity_search().search::<Note>("absent", 1).unwrap();
        assert!(results.is_empty());
        assert_eq!(results.total, 0);
    }

    #[test]
    fn test_unsearchable_entity_rejected() {
        let db = db_with_per_page(25);
        let err = db.entity_search().search::<Secret>("x", 1).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_page_zero_rejected() {
        let db = db_with_per_page(25);
        let err = db.entity_search().search::<Note>("test", 0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_reindex_typed() {
        let db = db_with_per_page(25);
        seed(&db, 4);
        let report = db.entity_search().reindex::<Note>().unwrap();
        assert_eq!(report.indexed, 4);
        assert_eq!(db.entity_search().search::<Note>("note", 1).unwrap().total, 4);
    }
}
