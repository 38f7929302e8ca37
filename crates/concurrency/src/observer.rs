//! Commit observers
//!
//! Observers are handed to each transaction explicitly; there is no global
//! listener registry. The transaction notifies them at two boundaries:
//!
//! - `before_commit`: after validation, before anything is applied. An
//!   error here aborts the transaction.
//! - `after_commit`: after the store applied the writes. An error here is
//!   reported in the commit outcome; the commit stands.

use crate::changes::CapturedChanges;
use nodwatch_core::{Error, Result};

/// Hook notified around a transaction's commit
pub trait CommitObserver: Send + Sync {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    /// Called with the captured changes before the commit is applied
    fn before_commit(&self, changes: &CapturedChanges) -> Result<()> {
        let _ = changes;
        Ok(())
    }

    /// Called with the captured changes once the commit is applied
    fn after_commit(&self, changes: &CapturedChanges, commit_version: u64) -> Result<()>;
}

/// An observer that failed after a successful commit
#[derive(Debug)]
pub struct ObserverFailure {
    /// Observer name
    pub observer: String,
    /// What went wrong
    pub error: Error,
}

impl std::fmt::Display for ObserverFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.observer, self.error)
    }
}
