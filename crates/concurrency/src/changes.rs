//! Change tracking at the commit boundary
//!
//! `ChangeTracker::capture` turns a transaction's write set into per-type
//! change sets for the searchable entity types. Records are cloned, so the
//! snapshot is immune to anything that happens to the write set afterwards.

use crate::write_set::{StagedOp, WriteSet};
use nodwatch_core::{EntityId, Record, SearchRegistry};
use std::collections::BTreeMap;

/// Which list an entity landed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Created in this transaction
    Added,
    /// Modified in this transaction
    Updated,
    /// Removed in this transaction
    Deleted,
}

/// Added/updated/deleted entities of one type
///
/// The three lists are disjoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Records created in the transaction
    pub added: Vec<Record>,
    /// Records modified in the transaction
    pub updated: Vec<Record>,
    /// Ids removed in the transaction
    pub deleted: Vec<EntityId>,
}

impl ChangeSet {
    /// Create an empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entities
    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.deleted.len()
    }

    /// Check if nothing changed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Where an entity landed, if anywhere
    pub fn kind_of(&self, id: &EntityId) -> Option<ChangeKind> {
        if self.added.iter().any(|r| &r.id == id) {
            Some(ChangeKind::Added)
        } else if self.updated.iter().any(|r| &r.id == id) {
            Some(ChangeKind::Updated)
        } else if self.deleted.contains(id) {
            Some(ChangeKind::Deleted)
        } else {
            None
        }
    }
}

/// Change sets of every searchable type touched by one transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedChanges {
    sets: BTreeMap<String, ChangeSet>,
}

impl CapturedChanges {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Change set for one type
    pub fn get(&self, entity_type: &str) -> Option<&ChangeSet> {
        self.sets.get(entity_type)
    }

    /// Iterate (type, change set) pairs in type-name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChangeSet)> {
        self.sets.iter().map(|(t, c)| (t.as_str(), c))
    }

    /// Total entities across all types
    pub fn total(&self) -> usize {
        self.sets.values().map(ChangeSet::len).sum()
    }

    /// Check if nothing searchable changed
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    fn entry(&mut self, entity_type: &str) -> &mut ChangeSet {
        self.sets.entry(entity_type.to_string()).or_default()
    }
}

/// Captures change sets from pending transactions
pub struct ChangeTracker;

impl ChangeTracker {
    /// Snapshot the searchable part of a write set
    ///
    /// Types without a descriptor in `registry` are ignored.
    pub fn capture(writes: &WriteSet, registry: &SearchRegistry) -> CapturedChanges {
        let mut captured = CapturedChanges::new();
        for (key, op) in writes.iter() {
            if !registry.is_searchable(&key.entity_type) {
                continue;
            }
            let set = captured.entry(&key.entity_type);
            match op {
                StagedOp::Insert(record) => set.added.push(record.clone()),
                StagedOp::Update(record) => set.updated.push(record.clone()),
                StagedOp::Delete(_) => set.deleted.push(key.id.clone()),
            }
        }
        captured
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodwatch_core::{EntityKey, SearchDescriptor};
    use serde_json::json;

    fn registry() -> SearchRegistry {
        let mut r = SearchRegistry::new();
        r.register(SearchDescriptor::new("post", ["body"]));
        r
    }

    fn record(entity_type: &str, id: i64, body: &str) -> Record {
        Record::new(entity_type, EntityId::Int(id), json!({ "body": body }))
    }

    #[test]
    fn test_capture_classifies() {
        let mut ws = WriteSet::new();
        ws.stage_insert(record("post", 1, "new"), false).unwrap();
        ws.stage_update(record("post", 2, "edited")).unwrap();
        ws.stage_delete(&EntityKey::new("post", 3), Some(record("post", 3, "gone")))
            .unwrap();

        let captured = ChangeTracker::capture(&ws, &registry());
        let set = captured.get("post").unwrap();
        assert_eq!(set.kind_of(&EntityId::Int(1)), Some(ChangeKind::Added));
        assert_eq!(set.kind_of(&EntityId::Int(2)), Some(ChangeKind::Updated));
        assert_eq!(set.kind_of(&EntityId::Int(3)), Some(ChangeKind::Deleted));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_capture_skips_unsearchable_types() {
        let mut ws = WriteSet::new();
        ws.stage_insert(record("task", 1, "export"), false).unwrap();
        ws.stage_insert(record("post", 1, "hello"), false).unwrap();

        let captured = ChangeTracker::capture(&ws, &registry());
        assert!(captured.get("task").is_none());
        assert_eq!(captured.total(), 1);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_mutation() {
        let mut ws = WriteSet::new();
        ws.stage_insert(record("post", 1, "before"), false).unwrap();

        let captured = ChangeTracker::capture(&ws, &registry());
        ws.stage_update(record("post", 1, "after")).unwrap();
        ws.stage_insert(record("post", 2, "late"), false).unwrap();

        let set = captured.get("post").unwrap();
        assert_eq!(set.added.len(), 1);
        assert_eq!(set.added[0].get_str("/body"), Some("before"));
    }

    #[test]
    fn test_empty_capture() {
        let captured = ChangeTracker::capture(&WriteSet::new(), &registry());
        assert!(captured.is_empty());
        assert_eq!(captured.iter().count(), 0);
    }
}
