//! Transaction manager for coordinating commits
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. take the commit lock
//! 2. validate read-set and staged inserts (first-committer-wins)
//! 3. IF conflicts: abort, return TransactionAborted; nothing applied
//! 4. capture the searchable change sets from the write set
//! 5. before_commit on every observer; an error aborts
//! 6. allocate commit_version
//! 7. apply writes and deletes to the store
//! 8. mark Committed
//! 9. after_commit on every observer; errors are reported, not raised
//! 10. release the commit lock
//! ```
//!
//! Observers run under the lock, so whatever they apply downstream sees
//! commits in commit order.

use crate::changes::ChangeTracker;
use crate::observer::ObserverFailure;
use crate::transaction::{CommitOutcome, Transaction, TransactionStatus};
use crate::validation::validate_transaction;
use nodwatch_core::{Error, Result, SearchRegistry};
use nodwatch_storage::ShardedStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Commit/abort counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Transactions started
    pub started: u64,
    /// Transactions committed
    pub committed: u64,
    /// Transactions aborted (explicitly, by conflict, or dropped)
    pub aborted: u64,
}

/// Owns the store handle and serializes commits
pub struct TransactionManager {
    store: Arc<ShardedStore>,
    registry: Arc<SearchRegistry>,
    next_txn_id: AtomicU64,
    commit_lock: Mutex<()>,
    started: AtomicU64,
    committed: AtomicU64,
    aborted: AtomicU64,
}

impl TransactionManager {
    /// Create a manager over a store
    ///
    /// `registry` decides which entity types get captured for observers.
    pub fn new(store: Arc<ShardedStore>, registry: Arc<SearchRegistry>) -> Self {
        TransactionManager {
            store,
            registry,
            next_txn_id: AtomicU64::new(1),
            commit_lock: Mutex::new(()),
            started: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
        }
    }

    /// The primary store
    pub fn store(&self) -> &Arc<ShardedStore> {
        &self.store
    }

    /// The search registry
    pub fn registry(&self) -> &Arc<SearchRegistry> {
        &self.registry
    }

    /// Current commit version of the store
    pub fn current_version(&self) -> u64 {
        self.store.version()
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> u64 {
        self.started.fetch_add(1, Ordering::Relaxed);
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Counters snapshot
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
        }
    }

    /// Run `f` while no transaction can commit
    pub fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.commit_lock.lock();
        f()
    }

    pub(crate) fn record_abort(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Commit a transaction
    ///
    /// Returns `TransactionAborted` on conflict or observer veto, in which
    /// case neither the store nor any observer saw the writes.
    pub fn commit(&self, txn: &mut Transaction) -> Result<CommitOutcome> {
        txn.ensure_active()?;
        txn.status = TransactionStatus::Validating;

        let _guard = self.commit_lock.lock();

        let validation = validate_transaction(&txn.read_set, &txn.writes, &self.store);
        if !validation.is_valid() {
            let reason = validation.summary();
            debug!(
                target: "nodwatch::txn",
                txn_id = txn.txn_id,
                conflicts = validation.conflict_count(),
                "commit rejected: {}", reason
            );
            return Err(self.fail(txn, reason));
        }

        let applied = txn.pending();
        if txn.writes.is_empty() {
            txn.status = TransactionStatus::Committed;
            self.committed.fetch_add(1, Ordering::Relaxed);
            return Ok(CommitOutcome {
                commit_version: self.store.version(),
                applied,
                index_failures: Vec::new(),
            });
        }

        let changes = ChangeTracker::capture(&txn.writes, &self.registry);

        for observer in &txn.observers {
            if let Err(e) = observer.before_commit(&changes) {
                let reason = format!("{} refused commit: {}", observer.name(), e);
                return Err(self.fail(txn, reason));
            }
        }

        let commit_version = self.store.next_version();
        self.store
            .apply_batch(&txn.writes.writes(), &txn.writes.deletes(), commit_version);
        txn.status = TransactionStatus::Committed;
        self.committed.fetch_add(1, Ordering::Relaxed);

        debug!(
            target: "nodwatch::txn",
            txn_id = txn.txn_id,
            commit_version,
            inserts = applied.inserts,
            updates = applied.updates,
            deletes = applied.deletes,
            "committed"
        );

        let mut index_failures = Vec::new();
        if !changes.is_empty() {
            for observer in &txn.observers {
                if let Err(error) = observer.after_commit(&changes, commit_version) {
                    warn!(
                        target: "nodwatch::txn",
                        txn_id = txn.txn_id,
                        commit_version,
                        observer = observer.name(),
                        "after-commit observer failed: {}", error
                    );
                    index_failures.push(ObserverFailure {
                        observer: observer.name().to_string(),
                        error,
                    });
                }
            }
        }

        Ok(CommitOutcome {
            commit_version,
            applied,
            index_failures,
        })
    }

    fn fail(&self, txn: &mut Transaction, reason: String) -> Error {
        txn.status = TransactionStatus::Aborted {
            reason: reason.clone(),
        };
        self.record_abort();
        Error::aborted(reason)
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("version", &self.current_version())
            .field("stats", &self.stats())
            .finish()
    }
}
