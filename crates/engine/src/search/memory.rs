//! The search index boundary and its in-process implementation
//!
//! Everything outside this module talks to the index through
//! [`SearchIndex`]; [`MemoryIndex`] keeps one [`InvertedIndex`] per entity
//! type plus the field payload of every entry.

use super::index::InvertedIndex;
use dashmap::DashMap;
use nodwatch_core::{EntityId, Error, FieldValues};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Failures reported by a search index backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexError {
    /// Index is switched off
    #[error("search index is disabled")]
    Disabled,

    /// Backend cannot be reached or is failing
    #[error("search index unavailable: {0}")]
    Unavailable(String),

    /// Backend refused one entry
    #[error("index rejected {entity_type}/{id}: {reason}")]
    Rejected {
        /// Entity type of the entry
        entity_type: String,
        /// Entity id of the entry
        id: EntityId,
        /// Backend message
        reason: String,
    },
}

impl From<IndexError> for Error {
    fn from(e: IndexError) -> Self {
        Error::SearchUnavailable(e.to_string())
    }
}

/// Ids of one result page plus the total match count
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexHits {
    /// Page of ids in relevance order
    pub ids: Vec<EntityId>,
    /// Matches across all pages
    pub total: usize,
}

impl IndexHits {
    /// No matches
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A full-text index keyed by (entity type, id)
pub trait SearchIndex: Send + Sync {
    /// Insert or replace the entry of an entity
    fn upsert(&self, entity_type: &str, id: &EntityId, fields: &FieldValues)
        -> Result<(), IndexError>;

    /// Remove the entry of an entity; removing a missing entry is not an error
    fn delete(&self, entity_type: &str, id: &EntityId) -> Result<(), IndexError>;

    /// One page of matches for `text`, 1-based `page`
    fn query(
        &self,
        entity_type: &str,
        text: &str,
        page: usize,
        page_size: usize,
    ) -> Result<IndexHits, IndexError>;

    /// Remove every entry of a type
    fn clear_type(&self, entity_type: &str) -> Result<(), IndexError>;
}

struct TypeIndex {
    inverted: InvertedIndex,
    entries: DashMap<EntityId, FieldValues>,
}

impl TypeIndex {
    fn new() -> Self {
        TypeIndex {
            inverted: InvertedIndex::new(),
            entries: DashMap::new(),
        }
    }
}

/// In-process [`SearchIndex`]
///
/// All indexed fields of an entry are searched together. When disabled,
/// every operation fails with [`IndexError::Disabled`] and existing entries
/// are left as they are.
pub struct MemoryIndex {
    types: DashMap<String, TypeIndex>,
    enabled: AtomicBool,
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIndex {
    /// Create an enabled, empty index
    pub fn new() -> Self {
        MemoryIndex {
            types: DashMap::new(),
            enabled: AtomicBool::new(true),
        }
    }

    /// Create a disabled index
    pub fn disabled() -> Self {
        let index = Self::new();
        index.disable();
        index
    }

    /// Check if index is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enable the index
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Disable the index; existing entries are kept
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    fn check_enabled(&self) -> Result<(), IndexError> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(IndexError::Disabled)
        }
    }

    /// Field payload stored for an entity
    pub fn entry(&self, entity_type: &str, id: &EntityId) -> Option<FieldValues> {
        self.types
            .get(entity_type)
            .and_then(|t| t.entries.get(id).map(|e| e.clone()))
    }

    /// Number of entries of a type
    pub fn len(&self, entity_type: &str) -> usize {
        self.types
            .get(entity_type)
            .map(|t| t.entries.len())
            .unwrap_or(0)
    }

    /// Check if a type has no entries
    pub fn is_empty(&self, entity_type: &str) -> bool {
        self.len(entity_type) == 0
    }

    /// Version watermark of a type's inverted index
    pub fn version(&self, entity_type: &str) -> u64 {
        self.types
            .get(entity_type)
            .map(|t| t.inverted.version())
            .unwrap_or(0)
    }
}

fn document_text(fields: &FieldValues) -> String {
    fields.values().map(String::as_str).collect::<Vec<_>>().join(" ")
}

impl SearchIndex for MemoryIndex {
    fn upsert(
        &self,
        entity_type: &str,
        id: &EntityId,
        fields: &FieldValues,
    ) -> Result<(), IndexError> {
        self.check_enabled()?;
        let type_index = self
            .types
            .entry(entity_type.to_string())
            .or_insert_with(TypeIndex::new);
        type_index
            .inverted
            .index_document(id, &document_text(fields));
        type_index.entries.insert(id.clone(), fields.clone());
        Ok(())
    }

    fn delete(&self, entity_type: &str, id: &EntityId) -> Result<(), IndexError> {
        self.check_enabled()?;
        if let Some(type_index) = self.types.get(entity_type) {
            type_index.inverted.remove_document(id);
            type_index.entries.remove(id);
        }
        Ok(())
    }

    fn query(
        &self,
        entity_type: &str,
        text: &str,
        page: usize,
        page_size: usize,
    ) -> Result<IndexHits, IndexError> {
        self.check_enabled()?;
        let type_index = match self.types.get(entity_type) {
            Some(t) => t,
            None => return Ok(IndexHits::empty()),
        };

        let ranked = type_index.inverted.score(text);
        let total = ranked.len();
        let ids = ranked
            .into_iter()
            .skip(page.saturating_sub(1).saturating_mul(page_size))
            .take(page_size)
            .map(|doc| doc.id)
            .collect();
        Ok(IndexHits { ids, total })
    }

    fn clear_type(&self, entity_type: &str) -> Result<(), IndexError> {
        self.check_enabled()?;
        if let Some(type_index) = self.types.get(entity_type) {
            type_index.inverted.clear();
            type_index.entries.clear();
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIndex")
            .field("enabled", &self.is_enabled())
            .field("types", &self.types.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(text: &str) -> FieldValues {
        let mut fields = FieldValues::new();
        fields.insert("body".to_string(), text.to_string());
        fields
    }

    fn id(n: i64) -> EntityId {
        EntityId::Int(n)
    }

    #[test]
    fn test_upsert_and_query() {
        let index = MemoryIndex::new();
        index.upsert("post", &id(1), &body("weight check")).unwrap();
        index.upsert("post", &id(2), &body("height check")).unwrap();

        let hits = index.query("post", "weight", 1, 10).unwrap();
        assert_eq!(hits.ids, vec![id(1)]);
        assert_eq!(hits.total, 1);
        assert_eq!(index.entry("post", &id(1)), Some(body("weight check")));
    }

    #[test]
    fn test_types_are_isolated() {
        let index = MemoryIndex::new();
        index.upsert("post", &id(1), &body("gulu")).unwrap();

        assert_eq!(index.query("waypoint", "gulu", 1, 10).unwrap(), IndexHits::empty());
    }

    #[test]
    fn test_pagination() {
        let index = MemoryIndex::new();
        for n in 1..=25 {
            index.upsert("post", &id(n), &body("test")).unwrap();
        }

        let first = index.query("post", "test", 1, 10).unwrap();
        assert_eq!(first.ids.len(), 10);
        assert_eq!(first.total, 25);
        assert_eq!(first.ids[0], id(1));

        let third = index.query("post", "test", 3, 10).unwrap();
        assert_eq!(third.ids, (21..=25).map(id).collect::<Vec<_>>());

        assert!(index.query("post", "test", 4, 10).unwrap().ids.is_empty());
    }

    #[test]
    fn test_multiple_fields_are_searched() {
        let index = MemoryIndex::new();
        let mut fields = body("clinic");
        fields.insert("place".to_string(), "Kitgum".to_string());
        index.upsert("waypoint", &id(1), &fields).unwrap();

        assert_eq!(index.query("waypoint", "kitgum", 1, 5).unwrap().ids, vec![id(1)]);
        assert_eq!(index.query("waypoint", "clinic", 1, 5).unwrap().ids, vec![id(1)]);
    }

    #[test]
    fn test_delete_and_clear() {
        let index = MemoryIndex::new();
        index.upsert("post", &id(1), &body("note")).unwrap();
        index.upsert("post", &id(2), &body("note")).unwrap();

        index.delete("post", &id(1)).unwrap();
        index.delete("post", &id(99)).unwrap();
        assert_eq!(index.query("post", "note", 1, 10).unwrap().ids, vec![id(2)]);
        assert!(index.entry("post", &id(1)).is_none());

        index.clear_type("post").unwrap();
        assert!(index.is_empty("post"));
        assert_eq!(index.query("post", "note", 1, 10).unwrap().total, 0);
    }

    #[test]
    fn test_disabled_rejects_every_operation() {
        let index = MemoryIndex::disabled();

        assert_eq!(index.upsert("post", &id(1), &body("note")), Err(IndexError::Disabled));
        assert_eq!(index.delete("post", &id(1)), Err(IndexError::Disabled));
        assert_eq!(index.query("post", "note", 1, 10), Err(IndexError::Disabled));
        assert_eq!(index.clear_type("post"), Err(IndexError::Disabled));
        assert_eq!(index.len("post"), 0);

        let err: Error = IndexError::Disabled.into();
        assert!(err.is_search_unavailable());
    }

    #[test]
    fn test_disable_keeps_entries() {
        let index = MemoryIndex::new();
        index.upsert("post", &id(1), &body("note")).unwrap();
        index.disable();

        assert!(index.delete("post", &id(1)).is_err());
        index.enable();
        assert_eq!(index.query("post", "note", 1, 10).unwrap().ids, vec![id(1)]);
    }
}
