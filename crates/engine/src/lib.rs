//! Database engine for Nodwatch
//!
//! This crate orchestrates the lower layers:
//! - Database: the primary store, transactions and commit observers
//! - Search: inverted index, commit-driven synchronization, ranked queries, reindex
//! - Config: `nodwatch.toml` parsing and validation
//! - Background: worker pool for deferred index sync and jobs
//! - Jobs: named background jobs with progress reporting

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod background;
pub mod config;
pub mod database;
pub mod jobs;
pub mod search;

pub use background::{BackgroundScheduler, SchedulerStats, SubmitError, TaskPriority};
pub use config::{JobsConfig, NodwatchConfig, SearchConfig, CONFIG_FILE_NAME, DEFAULT_PER_PAGE};
pub use database::{Database, DatabaseBuilder};
pub use jobs::{JobContext, JobQueue, JobStatus};
pub use search::{
    IndexError, IndexHits, IndexSynchronizer, MemoryIndex, QueryAdapter, ReindexReport,
    SearchIndex, SearchPage, SyncMode, SyncReport,
};
