//! Error types for Nodwatch
//!
//! This module defines the error type shared by every layer of the workspace.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! The variants map onto the three failure classes of the commit/search path:
//! - primary store failures (`TransactionAborted`, `TransactionNotActive`, `Storage`)
//!   fail the caller's operation and never touch the index
//! - index synchronization failures (`IndexSync`) are reported next to a
//!   successful commit; the index is stale, the data is not lost
//! - query failures (`SearchUnavailable`) signal degraded search and must never
//!   be confused with "no matches"

use crate::types::EntityKey;
use std::io;
use thiserror::Error;

/// Result type alias for Nodwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Nodwatch
#[derive(Debug, Error)]
pub enum Error {
    /// Entity does not exist in the primary store
    #[error("entity not found: {0}")]
    NotFound(EntityKey),

    /// An insert used an identifier that is already taken
    #[error("entity already exists: {0}")]
    AlreadyExists(EntityKey),

    /// Caller supplied an argument that can never succeed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation is not allowed in the current state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Commit did not succeed; nothing was applied to the store or the index
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Why the commit was refused
        reason: String,
    },

    /// Transaction was used after it left the active state
    #[error("transaction not active: {state}")]
    TransactionNotActive {
        /// Current state of the transaction
        state: String,
    },

    /// Commit succeeded but the search index could not be updated
    #[error("index sync failed for {} entit{}: {message}", stale.len(), if stale.len() == 1 { "y" } else { "ies" })]
    IndexSync {
        /// Entities whose index entries are now stale
        stale: Vec<EntityKey>,
        /// First underlying failure
        message: String,
    },

    /// Search could not be served
    #[error("search unavailable: {0}")]
    SearchUnavailable(String),

    /// Primary store error
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration file could not be read or is invalid
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Build an `InvalidInput` error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Build an `InvalidOperation` error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Error::InvalidOperation(msg.into())
    }

    /// Build a `TransactionAborted` error
    pub fn aborted(reason: impl Into<String>) -> Self {
        Error::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// True if this error means the commit did not happen
    pub fn is_primary_failure(&self) -> bool {
        matches!(
            self,
            Error::TransactionAborted { .. } | Error::TransactionNotActive { .. } | Error::Storage(_)
        )
    }

    /// True if search is degraded rather than empty
    pub fn is_search_unavailable(&self) -> bool {
        matches!(self, Error::SearchUnavailable(_))
    }
}
