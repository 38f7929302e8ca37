//! Primary store for Nodwatch
//!
//! In-memory, versioned, sharded by entity type. The store is the single
//! source of truth; the search index is derived from it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod sharded;

pub use sharded::{ScanCursor, Shard, ShardedStore, DEFAULT_SCAN_BATCH};
