//! Commit-time validation for optimistic transactions
//!
//! First-committer-wins on the read-set:
//! - every entity read records the version seen (0 when it did not exist)
//! - at commit, a changed version means someone else committed first
//! - blind writes (write without read) do not conflict
//!
//! Staged inserts are checked separately: an id committed by another
//! transaction in the meantime makes the insert conflict.

use crate::write_set::{StagedOp, WriteSet};
use nodwatch_core::EntityKey;
use nodwatch_storage::ShardedStore;
use rustc_hash::FxHashMap;

/// Conflicts detected during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// Entity was read at one version but the store now holds another
    ReadWriteConflict {
        /// Conflicting entity
        key: EntityKey,
        /// Version recorded in the read-set
        read_version: u64,
        /// Version in the store at validation time
        current_version: u64,
    },

    /// Staged insert targets an id that has since been committed
    InsertConflict {
        /// Conflicting entity
        key: EntityKey,
    },
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictType::ReadWriteConflict {
                key,
                read_version,
                current_version,
            } => write!(
                f,
                "{} changed since read (version {} -> {})",
                key, read_version, current_version
            ),
            ConflictType::InsertConflict { key } => write!(f, "{} was inserted concurrently", key),
        }
    }
}

/// Outcome of validating one transaction
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Every conflict found
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// No conflicts
    pub fn ok() -> Self {
        Self::default()
    }

    /// A single conflict
    pub fn conflict(conflict: ConflictType) -> Self {
        ValidationResult {
            conflicts: vec![conflict],
        }
    }

    /// True if the transaction may commit
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Fold another result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// One-line description for abort errors
    pub fn summary(&self) -> String {
        match self.conflicts.as_slice() {
            [] => "no conflicts".to_string(),
            [only] => only.to_string(),
            [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
        }
    }
}

/// Compare recorded read versions with the store
pub fn validate_read_set(
    read_set: &FxHashMap<EntityKey, u64>,
    store: &ShardedStore,
) -> ValidationResult {
    let mut result = ValidationResult::ok();

    for (key, read_version) in read_set {
        let current_version = store.version_of(key);
        if current_version != *read_version {
            result.conflicts.push(ConflictType::ReadWriteConflict {
                key: key.clone(),
                read_version: *read_version,
                current_version,
            });
        }
    }

    result
}

/// Check that staged inserts still target free ids
pub fn validate_inserts(writes: &WriteSet, store: &ShardedStore) -> ValidationResult {
    let mut result = ValidationResult::ok();

    for (key, op) in writes.iter() {
        if matches!(op, StagedOp::Insert(_)) && store.contains(key) {
            result
                .conflicts
                .push(ConflictType::InsertConflict { key: key.clone() });
        }
    }

    result
}

/// Full commit-time validation
pub fn validate_transaction(
    read_set: &FxHashMap<EntityKey, u64>,
    writes: &WriteSet,
    store: &ShardedStore,
) -> ValidationResult {
    let mut result = validate_read_set(read_set, store);
    result.merge(validate_inserts(writes, store));
    result
}
