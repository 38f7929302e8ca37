//! Sharded primary store
//!
//! DashMap keyed by entity type, FxHashMap within each shard.
//! Lock-free reads, per-type sharded writes, O(1) lookups.
//!
//! # Design
//!
//! - DashMap: 16-way sharded by default, lock-free reads
//! - FxHashMap: O(1) lookups, fast non-crypto hash
//! - Per-type shards: posts and waypoints never contend
//! - Per-type id sequence: integer ids are allocated from the shard
//!
//! Ordered access (fetch by id set, scans) sorts ids on the way out, so
//! callers always see ascending id order.

use chrono::Utc;
use dashmap::DashMap;
use nodwatch_core::{EntityId, EntityKey, Record, RecordSource, Result};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Records fetched per shard visit while scanning
pub const DEFAULT_SCAN_BATCH: usize = 64;

/// Per-type shard containing that type's records
#[derive(Debug)]
pub struct Shard {
    /// HashMap with FxHash for O(1) lookups
    pub(crate) data: FxHashMap<EntityId, Record>,
    /// Next integer id to hand out
    next_id: i64,
}

impl Shard {
    /// Create a new empty shard
    pub fn new() -> Self {
        Self {
            data: FxHashMap::default(),
            next_id: 1,
        }
    }

    /// Create a shard with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            next_id: 1,
        }
    }

    /// Get number of records in this shard
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if shard is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn bump_sequence(&mut self, id: &EntityId) {
        if let EntityId::Int(n) = id {
            if *n >= self.next_id {
                self.next_id = n + 1;
            }
        }
    }
}

impl Default for Shard {
    fn default() -> Self {
        Self::new()
    }
}

/// Sharded storage - DashMap by entity type, HashMap within
///
/// # Thread Safety
///
/// All operations are thread-safe:
/// - get(): Lock-free read via DashMap
/// - put(): Only locks the target type's shard
/// - Different types never contend
///
/// Atomicity across a batch is provided by the caller holding the commit
/// lock (see `nodwatch_concurrency::TransactionManager`); readers may observe
/// a batch partially applied across shards.
pub struct ShardedStore {
    /// Per-type shards using DashMap
    shards: DashMap<String, Shard>,
    /// Global commit version
    version: AtomicU64,
}

impl ShardedStore {
    /// Create new sharded store
    pub fn new() -> Self {
        Self {
            shards: DashMap::new(),
            version: AtomicU64::new(0),
        }
    }

    /// Create with expected number of entity types
    pub fn with_capacity(num_types: usize) -> Self {
        Self {
            shards: DashMap::with_capacity(num_types),
            version: AtomicU64::new(0),
        }
    }

    /// Get current version
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Increment version and return new value
    #[inline]
    pub fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Set version
    pub fn set_version(&self, version: u64) {
        self.version.store(version, Ordering::Release);
    }

    /// Get number of shards (entity types)
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Check if any record of a type was ever stored
    pub fn has_type(&self, entity_type: &str) -> bool {
        self.shards.contains_key(entity_type)
    }

    /// Get total number of records across all shards
    pub fn total_entries(&self) -> usize {
        self.shards.iter().map(|entry| entry.value().len()).sum()
    }

    /// Get count of records for a specific type
    pub fn type_entry_count(&self, entity_type: &str) -> usize {
        self.shards
            .get(entity_type)
            .map(|shard| shard.len())
            .unwrap_or(0)
    }

    // ========================================================================
    // Id allocation
    // ========================================================================

    /// Allocate the next integer id for a type
    ///
    /// Ids are never reused, even when the allocating transaction aborts.
    pub fn allocate_id(&self, entity_type: &str) -> EntityId {
        let mut shard = self
            .shards
            .entry(entity_type.to_string())
            .or_insert_with(Shard::new);
        let id = shard.next_id;
        shard.next_id += 1;
        EntityId::Int(id)
    }

    // ========================================================================
    // Get/Put/Delete Operations
    // ========================================================================

    /// Get a record by key
    ///
    /// Lock-free read via DashMap. Only the type's shard is accessed.
    #[inline]
    pub fn get(&self, key: &EntityKey) -> Option<Record> {
        self.get_record(&key.entity_type, &key.id)
    }

    /// Get a record by type and id
    #[inline]
    pub fn get_record(&self, entity_type: &str, id: &EntityId) -> Option<Record> {
        self.shards
            .get(entity_type)
            .and_then(|shard| shard.data.get(id).cloned())
    }

    /// Current version of a record, 0 if it does not exist
    #[inline]
    pub fn version_of(&self, key: &EntityKey) -> u64 {
        self.shards
            .get(&key.entity_type)
            .and_then(|shard| shard.data.get(&key.id).map(|r| r.version))
            .unwrap_or(0)
    }

    /// Put a record as-is
    ///
    /// Sharded write - only locks this type's shard.
    #[inline]
    pub fn put(&self, record: Record) {
        let mut shard = self
            .shards
            .entry(record.entity_type.clone())
            .or_insert_with(Shard::new);
        shard.bump_sequence(&record.id);
        shard.data.insert(record.id.clone(), record);
    }

    /// Delete a record
    ///
    /// Returns the removed record if it existed.
    #[inline]
    pub fn delete(&self, key: &EntityKey) -> Option<Record> {
        self.shards
            .get_mut(&key.entity_type)
            .and_then(|mut shard| shard.data.remove(&key.id))
    }

    /// Check if a record exists
    #[inline]
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.shards
            .get(&key.entity_type)
            .map(|shard| shard.data.contains_key(&key.id))
            .unwrap_or(false)
    }

    /// Apply a batch of writes and deletes with one commit version
    ///
    /// Every written record gets `version` and the commit timestamp as
    /// `modified_at`. `created_at` is kept from the stored record when one
    /// exists, otherwise set to the commit timestamp.
    pub fn apply_batch(&self, writes: &[Record], deletes: &[EntityKey], version: u64) {
        let now = Utc::now();

        for record in writes {
            let created_at = self
                .get_record(&record.entity_type, &record.id)
                .map(|existing| existing.created_at)
                .unwrap_or(now);
            let mut stored = record.clone();
            stored.version = version;
            stored.created_at = created_at;
            stored.modified_at = now;
            self.put(stored);
        }

        for key in deletes {
            self.delete(key);
        }
    }

    // ========================================================================
    // Ordered access
    // ========================================================================

    /// All ids of a type in ascending order
    pub fn ids(&self, entity_type: &str) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .shards
            .get(entity_type)
            .map(|shard| shard.data.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Records of a type whose ids are in `ids`, ascending by id
    pub fn get_many(&self, entity_type: &str, ids: &[EntityId]) -> Vec<Record> {
        let mut records: Vec<Record> = match self.shards.get(entity_type) {
            Some(shard) => ids
                .iter()
                .filter_map(|id| shard.data.get(id).cloned())
                .collect(),
            None => Vec::new(),
        };
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records.dedup_by(|a, b| a.id == b.id);
        records
    }

    /// Stream every record of a type in ascending id order
    pub fn scan(&self, entity_type: &str) -> ScanCursor<'_> {
        ScanCursor::new(self, entity_type, DEFAULT_SCAN_BATCH)
    }

    /// Stream with an explicit batch size
    pub fn scan_batched(&self, entity_type: &str, batch_size: usize) -> ScanCursor<'_> {
        ScanCursor::new(self, entity_type, batch_size.max(1))
    }
}

impl Default for ShardedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShardedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedStore")
            .field("shard_count", &self.shard_count())
            .field("version", &self.version())
            .field("total_entries", &self.total_entries())
            .finish()
    }
}

impl RecordSource for ShardedStore {
    fn fetch_many(&self, entity_type: &str, ids: &[EntityId]) -> Result<Vec<Record>> {
        Ok(self.get_many(entity_type, ids))
    }

    fn scan<'a>(&'a self, entity_type: &str) -> Box<dyn Iterator<Item = Record> + 'a> {
        Box::new(ShardedStore::scan(self, entity_type))
    }
}

/// Streaming cursor over one entity type
///
/// Holds the id list only; records are fetched a batch at a time, so a scan
/// never clones the whole shard. Records deleted after the cursor was opened
/// are skipped; records inserted after it was opened are not visited.
pub struct ScanCursor<'a> {
    store: &'a ShardedStore,
    entity_type: String,
    ids: Vec<EntityId>,
    pos: usize,
    batch_size: usize,
    buffer: VecDeque<Record>,
}

impl<'a> ScanCursor<'a> {
    fn new(store: &'a ShardedStore, entity_type: &str, batch_size: usize) -> Self {
        Self {
            store,
            entity_type: entity_type.to_string(),
            ids: store.ids(entity_type),
            pos: 0,
            batch_size,
            buffer: VecDeque::with_capacity(batch_size),
        }
    }

    /// Ids not yet fetched
    pub fn remaining_ids(&self) -> usize {
        self.ids.len() - self.pos
    }

    fn refill(&mut self) {
        while self.buffer.is_empty() && self.pos < self.ids.len() {
            let end = (self.pos + self.batch_size).min(self.ids.len());
            if let Some(shard) = self.store.shards.get(&self.entity_type) {
                for id in &self.ids[self.pos..end] {
                    if let Some(record) = shard.data.get(id) {
                        self.buffer.push_back(record.clone());
                    }
                }
            }
            self.pos = end;
        }
    }
}

impl Iterator for ScanCursor<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        if self.buffer.is_empty() {
            self.refill();
        }
        self.buffer.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn record(entity_type: &str, id: i64, body: &str) -> Record {
        Record::new(entity_type, EntityId::Int(id), json!({ "body": body }))
    }

    #[test]
    fn test_sharded_store_creation() {
        let store = ShardedStore::new();
        assert_eq!(store.shard_count(), 0);
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_sharded_store_with_capacity() {
        let store = ShardedStore::with_capacity(8);
        assert_eq!(store.shard_count(), 0);
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_version_increment() {
        let store = ShardedStore::new();
        assert_eq!(store.next_version(), 1);
        assert_eq!(store.next_version(), 2);
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_set_version() {
        let store = ShardedStore::new();
        store.set_version(100);
        assert_eq!(store.version(), 100);
    }

    #[test]
    fn test_version_thread_safety() {
        use std::thread;
        let store = Arc::new(ShardedStore::new());
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.next_version();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.version(), 1000);
    }

    #[test]
    fn test_allocate_id_is_sequential_per_type() {
        let store = ShardedStore::new();
        assert_eq!(store.allocate_id("post"), EntityId::Int(1));
        assert_eq!(store.allocate_id("post"), EntityId::Int(2));
        assert_eq!(store.allocate_id("waypoint"), EntityId::Int(1));
    }

    #[test]
    fn test_put_explicit_id_advances_sequence() {
        let store = ShardedStore::new();
        store.put(record("post", 10, "imported"));
        assert_eq!(store.allocate_id("post"), EntityId::Int(11));
    }

    #[test]
    fn test_put_and_get() {
        let store = ShardedStore::new();
        store.put(record("post", 1, "hello"));

        let key = EntityKey::new("post", 1);
        let retrieved = store.get(&key).unwrap();
        assert_eq!(retrieved.get_str("/body"), Some("hello"));
        assert!(store.contains(&key));
    }

    #[test]
    fn test_get_nonexistent() {
        let store = ShardedStore::new();
        assert!(store.get(&EntityKey::new("post", 1)).is_none());
        assert_eq!(store.version_of(&EntityKey::new("post", 1)), 0);
    }

    #[test]
    fn test_delete() {
        let store = ShardedStore::new();
        store.put(record("post", 1, "bye"));

        let key = EntityKey::new("post", 1);
        assert!(store.delete(&key).is_some());
        assert!(store.get(&key).is_none());
        assert!(store.delete(&key).is_none());
    }

    #[test]
    fn test_types_isolated() {
        let store = ShardedStore::new();
        store.put(record("post", 1, "post one"));
        store.put(record("waypoint", 1, "waypoint one"));

        assert_eq!(
            store.get(&EntityKey::new("post", 1)).unwrap().get_str("/body"),
            Some("post one")
        );
        assert_eq!(
            store
                .get(&EntityKey::new("waypoint", 1))
                .unwrap()
                .get_str("/body"),
            Some("waypoint one")
        );
        assert_eq!(store.shard_count(), 2);
    }

    #[test]
    fn test_apply_batch() {
        let store = ShardedStore::new();
        store.put(record("post", 3, "to delete"));

        let writes = vec![record("post", 1, "a"), record("post", 2, "b")];
        let deletes = vec![EntityKey::new("post", 3)];
        store.apply_batch(&writes, &deletes, 7);

        let r1 = store.get(&EntityKey::new("post", 1)).unwrap();
        assert_eq!(r1.version, 7);
        assert_eq!(store.version_of(&EntityKey::new("post", 2)), 7);
        assert!(store.get(&EntityKey::new("post", 3)).is_none());
    }

    #[test]
    fn test_apply_batch_keeps_created_at() {
        let store = ShardedStore::new();
        store.apply_batch(&[record("post", 1, "v1")], &[], 1);
        let first = store.get(&EntityKey::new("post", 1)).unwrap();

        store.apply_batch(&[record("post", 1, "v2")], &[], 2);
        let second = store.get(&EntityKey::new("post", 1)).unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.modified_at >= first.modified_at);
        assert_eq!(second.get_str("/body"), Some("v2"));
    }

    #[test]
    fn test_get_many_returns_ascending_ids() {
        let store = ShardedStore::new();
        for id in [9, 2, 7, 4] {
            store.put(record("post", id, "x"));
        }

        let ids: Vec<EntityId> = [7, 2, 9, 100].into_iter().map(EntityId::Int).collect();
        let got: Vec<EntityId> = store
            .get_many("post", &ids)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(got, vec![EntityId::Int(2), EntityId::Int(7), EntityId::Int(9)]);
    }

    #[test]
    fn test_get_many_unknown_type() {
        let store = ShardedStore::new();
        assert!(store.get_many("nothing", &[EntityId::Int(1)]).is_empty());
    }

    #[test]
    fn test_scan_streams_in_id_order() {
        let store = ShardedStore::new();
        for id in (1..=10).rev() {
            store.put(record("post", id, "x"));
        }

        let ids: Vec<i64> = store
            .scan_batched("post", 3)
            .map(|r| r.id.as_int().unwrap())
            .collect();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_scan_skips_records_deleted_mid_scan() {
        let store = ShardedStore::new();
        for id in 1..=6 {
            store.put(record("post", id, "x"));
        }

        let mut cursor = store.scan_batched("post", 2);
        assert_eq!(cursor.next().unwrap().id, EntityId::Int(1));
        store.delete(&EntityKey::new("post", 5));
        let rest: Vec<i64> = cursor.map(|r| r.id.as_int().unwrap()).collect();
        assert_eq!(rest, vec![2, 3, 4, 6]);
    }

    #[test]
    fn test_scan_empty_type() {
        let store = ShardedStore::new();
        assert_eq!(store.scan("post").count(), 0);
    }

    #[test]
    fn test_record_source_impl() {
        let store = ShardedStore::new();
        store.put(record("post", 1, "x"));
        let source: &dyn RecordSource = &store;
        assert_eq!(source.fetch_many("post", &[EntityId::Int(1)]).unwrap().len(), 1);
        assert_eq!(source.scan("post").count(), 1);
    }

    #[test]
    fn test_concurrent_writes_different_types() {
        use std::thread;

        let store = Arc::new(ShardedStore::new());

        let handles: Vec<_> = (0..10)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let entity_type = format!("type{}", t);
                    for _ in 0..100 {
                        let id = store.allocate_id(&entity_type);
                        store.put(Record::new(entity_type.clone(), id, json!({})));
                    }
                    entity_type
                })
            })
            .collect();

        let types: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for entity_type in &types {
            assert_eq!(store.type_entry_count(entity_type), 100);
        }
        assert_eq!(store.shard_count(), 10);
        assert_eq!(store.total_entries(), 1000);
    }

    #[test]
    fn test_debug_impl() {
        let store = ShardedStore::new();
        let debug_str = format!("{:?}", store);
        assert!(debug_str.contains("ShardedStore"));
        assert!(debug_str.contains("shard_count"));
    }
}
