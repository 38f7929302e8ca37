//! Index synchronization after commit
//!
//! [`IndexSynchronizer`] replays captured change sets against a
//! [`SearchIndex`]: added and updated records are upserted with their
//! declared fields, deleted ids are removed. It is installed on
//! transactions as a [`CommitObserver`], so it only ever sees changes of
//! commits that were applied to the store.
//!
//! In deferred mode [`DeferredSynchronizer`] hands each commit's changes to
//! a single-worker scheduler. Submission happens under the commit lock, so
//! the worker applies them in commit order.

use super::memory::{IndexError, SearchIndex};
use crate::background::{BackgroundScheduler, TaskPriority};
use nodwatch_concurrency::{CapturedChanges, ChangeSet, CommitObserver};
use nodwatch_core::{EntityKey, Error, Result, SearchRegistry};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// When index changes are applied relative to the commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// Right after the store apply, on the committing thread
    #[default]
    Inline,
    /// On a background worker, in commit order
    Deferred,
}

impl FromStr for SyncMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inline" => Ok(SyncMode::Inline),
            "deferred" => Ok(SyncMode::Deferred),
            other => Err(Error::Config(format!(
                "invalid search.sync_mode '{}', expected \"inline\" or \"deferred\"",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Inline => write!(f, "inline"),
            SyncMode::Deferred => write!(f, "deferred"),
        }
    }
}

/// One entity the index could not follow
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    /// Entity whose index entry is stale
    pub key: EntityKey,
    /// Backend error
    pub error: IndexError,
}

/// What one synchronization pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Entries inserted or replaced
    pub upserted: usize,
    /// Entries removed
    pub removed: usize,
    /// Entries that could not be written
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    /// True if every entry was written
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: SyncReport) {
        self.upserted += other.upserted;
        self.removed += other.removed;
        self.failures.extend(other.failures);
    }

    /// Turn failures into an `IndexSync` error
    pub fn into_result(self) -> Result<SyncReport> {
        if self.is_clean() {
            return Ok(self);
        }
        let message = self.failures[0].error.to_string();
        let stale = self.failures.into_iter().map(|f| f.key).collect();
        Err(Error::IndexSync { stale, message })
    }
}

/// Applies change sets to a search index
pub struct IndexSynchronizer {
    index: Arc<dyn SearchIndex>,
    registry: Arc<SearchRegistry>,
}

impl IndexSynchronizer {
    /// Create a synchronizer
    pub fn new(index: Arc<dyn SearchIndex>, registry: Arc<SearchRegistry>) -> Self {
        IndexSynchronizer { index, registry }
    }

    /// Apply the changes of one entity type
    ///
    /// Every entry is attempted; failures are collected, not raised. Types
    /// without a search descriptor are ignored.
    pub fn apply_changes(&self, entity_type: &str, changes: &ChangeSet) -> SyncReport {
        let mut report = SyncReport::default();
        let descriptor = match self.registry.get(entity_type) {
            Some(d) => d,
            None => return report,
        };

        for record in changes.added.iter().chain(changes.updated.iter()) {
            let fields = descriptor.extract(record);
            match self.index.upsert(entity_type, &record.id, &fields) {
                Ok(()) => report.upserted += 1,
                Err(error) => report.failures.push(SyncFailure {
                    key: record.key(),
                    error,
                }),
            }
        }

        for id in &changes.deleted {
            match self.index.delete(entity_type, id) {
                Ok(()) => report.removed += 1,
                Err(error) => report.failures.push(SyncFailure {
                    key: EntityKey::new(entity_type, id.clone()),
                    error,
                }),
            }
        }

        report
    }

    /// Apply every type's changes
    pub fn apply_all(&self, changes: &CapturedChanges) -> SyncReport {
        let mut report = SyncReport::default();
        for (entity_type, set) in changes.iter() {
            report.merge(self.apply_changes(entity_type, set));
        }
        report
    }
}

impl CommitObserver for IndexSynchronizer {
    fn name(&self) -> &str {
        "index-sync"
    }

    fn after_commit(&self, changes: &CapturedChanges, commit_version: u64) -> Result<()> {
        let report = self.apply_all(changes);
        debug!(
            target: "nodwatch::index",
            commit_version,
            upserted = report.upserted,
            removed = report.removed,
            failed = report.failures.len(),
            "index synchronized"
        );
        report.into_result().map(|_| ())
    }
}

/// Applies change sets on a dedicated background worker
pub struct DeferredSynchronizer {
    sync: Arc<IndexSynchronizer>,
    scheduler: Arc<BackgroundScheduler>,
    failed: Arc<AtomicU64>,
}

impl DeferredSynchronizer {
    /// Create a deferred synchronizer
    ///
    /// `scheduler` must have exactly one worker to preserve commit order.
    pub fn new(sync: Arc<IndexSynchronizer>, scheduler: Arc<BackgroundScheduler>) -> Self {
        DeferredSynchronizer {
            sync,
            scheduler,
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Block until every submitted change set has been applied
    pub fn flush(&self) {
        self.scheduler.drain();
    }

    /// Entries that failed to apply in the background so far
    pub fn failed_entries(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl CommitObserver for DeferredSynchronizer {
    fn name(&self) -> &str {
        "index-sync-deferred"
    }

    fn after_commit(&self, changes: &CapturedChanges, commit_version: u64) -> Result<()> {
        let sync = Arc::clone(&self.sync);
        let failed = Arc::clone(&self.failed);
        let owned = changes.clone();

        let submitted = self.scheduler.submit(TaskPriority::Normal, move || {
            let report = sync.apply_all(&owned);
            if !report.is_clean() {
                failed.fetch_add(report.failures.len() as u64, Ordering::Relaxed);
                if let Err(e) = report.into_result() {
                    warn!(
                        target: "nodwatch::index",
                        commit_version,
                        "deferred index sync failed: {}", e
                    );
                }
            }
        });

        submitted.map_err(|e| {
            let stale = changes
                .iter()
                .flat_map(|(entity_type, set)| {
                    set.added
                        .iter()
                        .chain(set.updated.iter())
                        .map(|r| r.id.clone())
                        .chain(set.deleted.iter().cloned())
                        .map(move |id| EntityKey::new(entity_type, id))
                })
                .collect();
            Error::IndexSync {
                stale,
                message: e.to_string(),
            }
        })
    }
}
