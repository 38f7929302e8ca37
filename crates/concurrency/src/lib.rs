//! Transactions and commit-boundary change tracking for Nodwatch
//!
//! This crate implements optimistic concurrency control (OCC) over the
//! sharded store:
//! - buffered writes collapsed to one net effect per entity
//! - read-set validation at commit (first-committer-wins)
//! - change capture for searchable types before the commit applies
//! - commit observers notified before and after the commit

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod changes;
pub mod manager;
pub mod observer;
pub mod transaction;
pub mod validation;
pub mod write_set;

pub use changes::{CapturedChanges, ChangeKind, ChangeSet, ChangeTracker};
pub use manager::{ManagerStats, TransactionManager};
pub use observer::{CommitObserver, ObserverFailure};
pub use transaction::{CommitOutcome, PendingOperations, Transaction, TransactionStatus};
pub use validation::{ConflictType, ValidationResult};
pub use write_set::{StagedOp, WriteSet};
