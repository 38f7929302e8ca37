//! Staged writes of a transaction
//!
//! One staged operation per entity key. Repeated operations on the same key
//! collapse into a single net effect, which is what makes the captured change
//! set disjoint: an entity can only ever be added, updated or deleted.

use nodwatch_core::{EntityKey, Error, Record, Result};
use rustc_hash::FxHashMap;

/// Net effect of a transaction on one entity
#[derive(Debug, Clone, PartialEq)]
pub enum StagedOp {
    /// Entity did not exist before this transaction
    Insert(Record),
    /// Entity existed and gets new data
    Update(Record),
    /// Entity existed and is removed; holds the last committed image
    Delete(Record),
}

impl StagedOp {
    /// The record carried by this op
    pub fn record(&self) -> &Record {
        match self {
            StagedOp::Insert(r) | StagedOp::Update(r) | StagedOp::Delete(r) => r,
        }
    }

    /// True for deletes
    pub fn is_delete(&self) -> bool {
        matches!(self, StagedOp::Delete(_))
    }
}

/// Buffered writes, keyed by entity, in first-touch order
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    ops: FxHashMap<EntityKey, StagedOp>,
    order: Vec<EntityKey>,
}

impl WriteSet {
    /// Create an empty write set
    pub fn new() -> Self {
        Self::default()
    }

    /// Staged op for a key
    pub fn get(&self, key: &EntityKey) -> Option<&StagedOp> {
        self.ops.get(key)
    }

    /// Number of staged entities
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if nothing is staged
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Staged ops in first-touch order
    pub fn iter(&self) -> impl Iterator<Item = (&EntityKey, &StagedOp)> {
        self.order
            .iter()
            .filter_map(move |key| self.ops.get(key).map(|op| (key, op)))
    }

    /// Stage an insert
    ///
    /// `exists_in_store` tells whether the id is already committed. Inserting
    /// over a staged delete of the same id becomes an update.
    pub fn stage_insert(&mut self, record: Record, exists_in_store: bool) -> Result<()> {
        let key = record.key();
        match self.ops.get(&key) {
            None if exists_in_store => Err(Error::AlreadyExists(key)),
            None => {
                self.push(key, StagedOp::Insert(record));
                Ok(())
            }
            Some(StagedOp::Delete(previous)) => {
                let mut record = record;
                record.created_at = previous.created_at;
                self.ops.insert(key, StagedOp::Update(record));
                Ok(())
            }
            Some(StagedOp::Insert(_)) | Some(StagedOp::Update(_)) => Err(Error::AlreadyExists(key)),
        }
    }

    /// Stage an update of an entity the caller knows exists
    ///
    /// Updating a staged insert keeps it an insert.
    pub fn stage_update(&mut self, record: Record) -> Result<()> {
        let key = record.key();
        match self.ops.get(&key) {
            None => {
                self.push(key, StagedOp::Update(record));
                Ok(())
            }
            Some(StagedOp::Insert(_)) => {
                self.ops.insert(key, StagedOp::Insert(record));
                Ok(())
            }
            Some(StagedOp::Update(_)) => {
                self.ops.insert(key, StagedOp::Update(record));
                Ok(())
            }
            Some(StagedOp::Delete(_)) => Err(Error::invalid_operation(format!(
                "cannot update {}: already deleted in this transaction",
                key
            ))),
        }
    }

    /// Stage a delete
    ///
    /// `stored` is the committed image, if the entity exists in the store.
    /// Deleting a staged insert drops it entirely. Returns whether anything
    /// was deleted.
    pub fn stage_delete(&mut self, key: &EntityKey, stored: Option<Record>) -> Result<bool> {
        match self.ops.get(key) {
            None => match stored {
                Some(record) => {
                    self.push(key.clone(), StagedOp::Delete(record));
                    Ok(true)
                }
                None => Ok(false),
            },
            Some(StagedOp::Insert(_)) => {
                self.ops.remove(key);
                self.order.retain(|k| k != key);
                Ok(true)
            }
            Some(StagedOp::Update(staged)) => {
                let image = stored.unwrap_or_else(|| staged.clone());
                self.ops.insert(key.clone(), StagedOp::Delete(image));
                Ok(true)
            }
            Some(StagedOp::Delete(_)) => Err(Error::invalid_operation(format!(
                "cannot delete {}: already deleted in this transaction",
                key
            ))),
        }
    }

    /// Records to write at commit (inserts and updates), in order
    pub fn writes(&self) -> Vec<Record> {
        self.iter()
            .filter(|(_, op)| !op.is_delete())
            .map(|(_, op)| op.record().clone())
            .collect()
    }

    /// Keys to delete at commit, in order
    pub fn deletes(&self) -> Vec<EntityKey> {
        self.iter()
            .filter(|(_, op)| op.is_delete())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Counts of staged ops by kind
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for op in self.ops.values() {
            match op {
                StagedOp::Insert(_) => counts.0 += 1,
                StagedOp::Update(_) => counts.1 += 1,
                StagedOp::Delete(_) => counts.2 += 1,
            }
        }
        counts
    }

    fn push(&mut self, key: EntityKey, op: StagedOp) {
        self.order.push(key.clone());
        self.ops.insert(key, op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodwatch_core::EntityId;
    use serde_json::json;

    fn post(id: i64, body: &str) -> Record {
        Record::new("post", EntityId::Int(id), json!({ "body": body }))
    }

    #[test]
    fn test_insert_then_update_stays_insert() {
        let mut ws = WriteSet::new();
        ws.stage_insert(post(1, "draft"), false).unwrap();
        ws.stage_update(post(1, "final")).unwrap();

        match ws.get(&EntityKey::new("post", 1)).unwrap() {
            StagedOp::Insert(r) => assert_eq!(r.get_str("/body"), Some("final")),
            other => panic!("expected insert, got {:?}", other),
        }
        assert_eq!(ws.len(), 1);
    }

    #[test]
    fn test_insert_then_delete_vanishes() {
        let mut ws = WriteSet::new();
        ws.stage_insert(post(1, "oops"), false).unwrap();
        assert!(ws.stage_delete(&EntityKey::new("post", 1), None).unwrap());
        assert!(ws.is_empty());
        assert_eq!(ws.iter().count(), 0);
    }

    #[test]
    fn test_update_then_delete_is_delete() {
        let mut ws = WriteSet::new();
        let stored = post(1, "committed");
        ws.stage_update(post(1, "edited")).unwrap();
        ws.stage_delete(&EntityKey::new("post", 1), Some(stored.clone()))
            .unwrap();

        assert_eq!(
            ws.get(&EntityKey::new("post", 1)),
            Some(&StagedOp::Delete(stored))
        );
    }

    #[test]
    fn test_delete_then_insert_is_update() {
        let mut ws = WriteSet::new();
        ws.stage_delete(&EntityKey::new("post", 1), Some(post(1, "old")))
            .unwrap();
        ws.stage_insert(post(1, "new"), true).unwrap();

        assert!(matches!(
            ws.get(&EntityKey::new("post", 1)),
            Some(StagedOp::Update(_))
        ));
    }

    #[test]
    fn test_delete_then_update_rejected() {
        let mut ws = WriteSet::new();
        ws.stage_delete(&EntityKey::new("post", 1), Some(post(1, "old")))
            .unwrap();
        let err = ws.stage_update(post(1, "new")).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        assert!(ws.get(&EntityKey::new("post", 1)).unwrap().is_delete());
    }

    #[test]
    fn test_double_delete_rejected() {
        let mut ws = WriteSet::new();
        let key = EntityKey::new("post", 1);
        ws.stage_delete(&key, Some(post(1, "old"))).unwrap();
        assert!(ws.stage_delete(&key, Some(post(1, "old"))).is_err());
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let mut ws = WriteSet::new();
        assert!(!ws.stage_delete(&EntityKey::new("post", 1), None).unwrap());
        assert!(ws.is_empty());
    }

    #[test]
    fn test_insert_existing_rejected() {
        let mut ws = WriteSet::new();
        let err = ws.stage_insert(post(1, "dup"), true).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[test]
    fn test_writes_and_deletes_keep_order() {
        let mut ws = WriteSet::new();
        ws.stage_insert(post(3, "c"), false).unwrap();
        ws.stage_delete(&EntityKey::new("post", 9), Some(post(9, "z")))
            .unwrap();
        ws.stage_insert(post(1, "a"), false).unwrap();

        let ids: Vec<EntityId> = ws.writes().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![EntityId::Int(3), EntityId::Int(1)]);
        assert_eq!(ws.deletes(), vec![EntityKey::new("post", 9)]);
        assert_eq!(ws.counts(), (2, 0, 1));
    }
}
