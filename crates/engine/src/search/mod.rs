//! Search indexing and querying
//!
//! - `tokenizer`: text → terms
//! - `index`: per-type inverted index with BM25 ranking
//! - `memory`: the [`SearchIndex`] boundary and the in-process [`MemoryIndex`]
//! - `sync`: commit-driven index synchronization
//! - `query`: ranked id pages and in-order resolution against the store
//! - `reindex`: full rebuild of one type from the store

mod index;
mod memory;
mod query;
mod reindex;
mod sync;
pub mod tokenizer;

pub use index::{InvertedIndex, PostingEntry, PostingList, ScoredDoc, BM25_B, BM25_K1};
pub use memory::{IndexError, IndexHits, MemoryIndex, SearchIndex};
pub use query::{resolve_in_order, QueryAdapter, SearchPage};
pub use reindex::{reindex, ReindexReport};
pub use sync::{DeferredSynchronizer, IndexSynchronizer, SyncFailure, SyncMode, SyncReport};
pub use tokenizer::{tokenize, tokenize_unique};
