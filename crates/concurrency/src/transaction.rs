//! Optimistic transactions over the sharded store
//!
//! A transaction buffers every write in its [`WriteSet`] and records the
//! version of every entity it reads, updates or deletes. Nothing reaches the
//! store until [`Transaction::commit`]; abort (or drop) discards the buffer.

use crate::manager::TransactionManager;
use crate::observer::{CommitObserver, ObserverFailure};
use crate::write_set::{StagedOp, WriteSet};
use nodwatch_core::{Entity, EntityId, EntityKey, Error, Record, Result, Stored};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Validating` (commit begins)
/// - `Validating` → `Committed` or `Aborted`
/// - `Active` → `Aborted` (explicit abort)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is executing, can read/write
    Active,
    /// Transaction is being validated for conflicts
    Validating,
    /// Transaction committed successfully
    Committed,
    /// Transaction was aborted
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Active => write!(f, "active"),
            TransactionStatus::Validating => write!(f, "validating"),
            TransactionStatus::Committed => write!(f, "committed"),
            TransactionStatus::Aborted { reason } => write!(f, "aborted ({})", reason),
        }
    }
}

/// Summary of staged operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingOperations {
    /// Entities that will be created
    pub inserts: usize,
    /// Entities that will be modified
    pub updates: usize,
    /// Entities that will be removed
    pub deletes: usize,
}

impl PendingOperations {
    /// Total number of pending operations
    pub fn total(&self) -> usize {
        self.inserts + self.updates + self.deletes
    }

    /// Check if there are no pending operations
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Result of a successful commit
#[derive(Debug)]
pub struct CommitOutcome {
    /// Version assigned to every write of the transaction
    pub commit_version: u64,
    /// What was applied to the store
    pub applied: PendingOperations,
    /// After-commit observers that failed; the commit stands regardless
    pub index_failures: Vec<ObserverFailure>,
}

impl CommitOutcome {
    /// True if every observer kept up with the commit
    pub fn is_clean(&self) -> bool {
        self.index_failures.is_empty()
    }
}

/// A unit of work against the primary store
pub struct Transaction {
    pub(crate) txn_id: u64,
    pub(crate) manager: Arc<TransactionManager>,
    pub(crate) observers: Vec<Arc<dyn CommitObserver>>,
    pub(crate) read_set: FxHashMap<EntityKey, u64>,
    pub(crate) writes: WriteSet,
    pub(crate) status: TransactionStatus,
}

impl Transaction {
    /// Begin a transaction with the given commit observers
    pub fn begin(
        manager: Arc<TransactionManager>,
        observers: Vec<Arc<dyn CommitObserver>>,
    ) -> Self {
        let txn_id = manager.next_txn_id();
        Transaction {
            txn_id,
            manager,
            observers,
            read_set: FxHashMap::default(),
            writes: WriteSet::new(),
            status: TransactionStatus::Active,
        }
    }

    /// Transaction id
    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }

    /// Current status
    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    /// Check if the transaction still accepts operations
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// The buffered writes
    pub fn write_set(&self) -> &WriteSet {
        &self.writes
    }

    /// Versions recorded for every entity observed so far
    pub fn read_set(&self) -> &FxHashMap<EntityKey, u64> {
        &self.read_set
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::TransactionNotActive {
                state: self.status.to_string(),
            })
        }
    }

    // ========================================================================
    // Untyped operations
    // ========================================================================

    /// Insert a record under a freshly allocated integer id
    pub fn insert(&mut self, entity_type: &str, data: serde_json::Value) -> Result<EntityId> {
        self.ensure_active()?;
        let id = self.manager.store().allocate_id(entity_type);
        self.writes
            .stage_insert(Record::new(entity_type, id.clone(), data), false)?;
        Ok(id)
    }

    /// Insert a record under an explicit id
    ///
    /// Fails with `AlreadyExists` if the id is taken, unless this
    /// transaction staged its deletion.
    pub fn insert_with_id(
        &mut self,
        entity_type: &str,
        id: impl Into<EntityId>,
        data: serde_json::Value,
    ) -> Result<()> {
        self.ensure_active()?;
        let record = Record::new(entity_type, id.into(), data);
        let key = record.key();
        let exists = self.observe(&key).is_some();
        self.writes.stage_insert(record, exists)
    }

    /// Read a record, seeing this transaction's own writes
    pub fn get(&mut self, key: &EntityKey) -> Result<Option<Record>> {
        self.ensure_active()?;
        if let Some(op) = self.writes.get(key) {
            return Ok(match op {
                StagedOp::Insert(r) | StagedOp::Update(r) => Some(r.clone()),
                StagedOp::Delete(_) => None,
            });
        }
        Ok(self.observe(key))
    }

    /// Replace the data of an existing record
    pub fn update(
        &mut self,
        entity_type: &str,
        id: impl Into<EntityId>,
        data: serde_json::Value,
    ) -> Result<()> {
        self.ensure_active()?;
        let key = EntityKey::new(entity_type, id);
        let mut record = Record::new(entity_type, key.id.clone(), data);

        match self.writes.get(&key) {
            Some(StagedOp::Insert(staged)) | Some(StagedOp::Update(staged)) => {
                record.created_at = staged.created_at;
            }
            Some(StagedOp::Delete(_)) => {}
            None => match self.observe(&key) {
                Some(stored) => record.created_at = stored.created_at,
                None => return Err(Error::NotFound(key)),
            },
        }
        self.writes.stage_update(record)
    }

    /// Delete a record
    ///
    /// Returns whether anything was deleted.
    pub fn delete(&mut self, key: &EntityKey) -> Result<bool> {
        self.ensure_active()?;
        let stored = match self.writes.get(key) {
            Some(StagedOp::Insert(_)) => None,
            _ => self.observe(key),
        };
        self.writes.stage_delete(key, stored)
    }

    // ========================================================================
    // Typed operations
    // ========================================================================

    /// Insert a typed entity under a fresh id
    pub fn insert_entity<T: Entity>(&mut self, entity: &T) -> Result<EntityId> {
        let data = serde_json::to_value(entity)?;
        self.insert(T::TYPE_NAME, data)
    }

    /// Insert a typed entity under an explicit id
    pub fn insert_entity_with_id<T: Entity>(
        &mut self,
        id: impl Into<EntityId>,
        entity: &T,
    ) -> Result<()> {
        let data = serde_json::to_value(entity)?;
        self.insert_with_id(T::TYPE_NAME, id, data)
    }

    /// Read a typed entity
    pub fn get_entity<T: Entity>(&mut self, id: impl Into<EntityId>) -> Result<Option<Stored<T>>> {
        let key = EntityKey::new(T::TYPE_NAME, id);
        match self.get(&key)? {
            Some(record) => record.decode::<T>().map(Some),
            None => Ok(None),
        }
    }

    /// Replace a typed entity
    pub fn update_entity<T: Entity>(&mut self, id: impl Into<EntityId>, entity: &T) -> Result<()> {
        let data = serde_json::to_value(entity)?;
        self.update(T::TYPE_NAME, id, data)
    }

    /// Delete a typed entity
    pub fn delete_entity<T: Entity>(&mut self, id: impl Into<EntityId>) -> Result<bool> {
        self.delete(&EntityKey::new(T::TYPE_NAME, id))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Summary of what commit would apply
    pub fn pending(&self) -> PendingOperations {
        let (inserts, updates, deletes) = self.writes.counts();
        PendingOperations {
            inserts,
            updates,
            deletes,
        }
    }

    /// Discard every staged write
    pub fn abort(&mut self, reason: impl Into<String>) -> Result<()> {
        self.ensure_active()?;
        let reason = reason.into();
        debug!(target: "nodwatch::txn", txn_id = self.txn_id, "aborted: {}", reason);
        self.status = TransactionStatus::Aborted { reason };
        self.writes = WriteSet::new();
        self.manager.record_abort();
        Ok(())
    }

    /// Validate and apply, then notify observers
    pub fn commit(mut self) -> Result<CommitOutcome> {
        let manager = Arc::clone(&self.manager);
        manager.commit(&mut self)
    }

    /// Read from the store and record the version seen
    fn observe(&mut self, key: &EntityKey) -> Option<Record> {
        let stored = self.manager.store().get(key);
        let version = stored.as_ref().map(|r| r.version).unwrap_or(0);
        self.read_set.entry(key.clone()).or_insert(version);
        stored
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() {
            debug!(
                target: "nodwatch::txn",
                txn_id = self.txn_id,
                pending = self.writes.len(),
                "dropped without commit, discarding writes"
            );
            self.manager.record_abort();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("txn_id", &self.txn_id)
            .field("status", &self.status)
            .field("reads", &self.read_set.len())
            .field("pending", &self.pending())
            .finish()
    }
}
