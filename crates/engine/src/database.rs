//! Database: the primary store, its transactions and the derived search index
//!
//! The database wires the pieces together:
//! - a [`ShardedStore`] as the single source of truth
//! - a [`TransactionManager`] serializing commits
//! - an [`IndexSynchronizer`] installed on every transaction as a commit
//!   observer (inline or deferred, per `search.sync_mode`)
//! - a [`QueryAdapter`] for ranked searches resolved against the store
//! - a [`JobQueue`] for background work
//!
//! # Example
//!
//! ```
//! use nodwatch_core::SearchDescriptor;
//! use nodwatch_engine::DatabaseBuilder;
//! use serde_json::json;
//!
//! let db = DatabaseBuilder::new()
//!     .register_descriptor(SearchDescriptor::new("post", ["body"]))
//!     .build()
//!     .unwrap();
//!
//! db.transaction(|txn| txn.insert("post", json!({ "body": "clinic visit" })))
//!     .unwrap();
//! let page = db.search("post", "clinic", 1, 25).unwrap();
//! assert_eq!(page.total, 1);
//! ```

use crate::background::BackgroundScheduler;
use crate::config::{NodwatchConfig, CONFIG_FILE_NAME};
use crate::jobs::JobQueue;
use crate::search::{
    reindex, resolve_in_order, DeferredSynchronizer, IndexSynchronizer, MemoryIndex,
    QueryAdapter, ReindexReport, SearchIndex, SearchPage, SyncMode,
};
use nodwatch_concurrency::{CommitObserver, CommitOutcome, Transaction, TransactionManager};
use nodwatch_core::{
    Entity, EntityId, EntityKey, Error, Record, RecordSource, Result, SearchDescriptor,
    SearchRegistry, Stored,
};
use nodwatch_storage::{ScanCursor, ShardedStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Configures and opens a [`Database`]
pub struct DatabaseBuilder {
    config: NodwatchConfig,
    data_dir: Option<PathBuf>,
    registry: SearchRegistry,
    index: Option<Arc<dyn SearchIndex>>,
    observers: Vec<Arc<dyn CommitObserver>>,
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseBuilder {
    /// Builder with default configuration and no searchable types
    pub fn new() -> Self {
        DatabaseBuilder {
            config: NodwatchConfig::default(),
            data_dir: None,
            registry: SearchRegistry::new(),
            index: None,
            observers: Vec::new(),
        }
    }

    /// Use an explicit configuration
    pub fn config(mut self, config: NodwatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from `<dir>/nodwatch.toml`
    ///
    /// Creates the directory and a default config file if missing.
    pub fn data_dir(mut self, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(CONFIG_FILE_NAME);
        if NodwatchConfig::write_default_if_missing(&path)? {
            info!(target: "nodwatch::db", path = %path.display(), "wrote default config");
        }
        self.config = NodwatchConfig::from_file(&path)?;
        self.data_dir = Some(dir.to_path_buf());
        Ok(self)
    }

    /// Register a typed entity; types without a descriptor are not indexed
    pub fn register<T: Entity>(mut self) -> Self {
        self.registry.register_entity::<T>();
        self
    }

    /// Register searchable fields for an entity type
    pub fn register_descriptor(mut self, descriptor: SearchDescriptor) -> Self {
        self.registry.register(descriptor);
        self
    }

    /// Use a specific search index backend
    pub fn index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Add a commit observer, notified after the index synchronizer
    pub fn observer(mut self, observer: Arc<dyn CommitObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Open the database
    pub fn build(self) -> Result<Database> {
        self.config.validate()?;
        let sync_mode = self.config.sync_mode()?;
        let search_enabled = self.config.search.enabled;

        let store = Arc::new(ShardedStore::new());
        let registry = Arc::new(self.registry);
        let manager = Arc::new(TransactionManager::new(
            Arc::clone(&store),
            Arc::clone(&registry),
        ));

        let index: Arc<dyn SearchIndex> = match self.index {
            Some(index) => index,
            None if search_enabled => Arc::new(MemoryIndex::new()),
            None => Arc::new(MemoryIndex::disabled()),
        };

        let mut observers: Vec<Arc<dyn CommitObserver>> = Vec::new();
        let mut deferred = None;
        if search_enabled {
            let sync = Arc::new(IndexSynchronizer::new(
                Arc::clone(&index),
                Arc::clone(&registry),
            ));
            match sync_mode {
                SyncMode::Inline => observers.push(sync),
                SyncMode::Deferred => {
                    let scheduler = Arc::new(BackgroundScheduler::new(
                        "nodwatch-index",
                        1,
                        self.config.jobs.max_queue_depth,
                    )?);
                    let synchronizer = Arc::new(DeferredSynchronizer::new(sync, scheduler));
                    observers.push(Arc::clone(&synchronizer) as Arc<dyn CommitObserver>);
                    deferred = Some(synchronizer);
                }
            }
        }
        observers.extend(self.observers);

        let jobs = JobQueue::new(self.config.jobs.workers, self.config.jobs.max_queue_depth)?;

        info!(
            target: "nodwatch::db",
            search_enabled,
            sync_mode = %sync_mode,
            searchable_types = registry.len(),
            "database opened"
        );

        Ok(Database {
            config: self.config,
            data_dir: self.data_dir,
            store,
            registry,
            manager,
            adapter: QueryAdapter::new(Arc::clone(&index)),
            index,
            observers,
            deferred,
            jobs,
            search_enabled,
        })
    }
}

/// An open database
pub struct Database {
    config: NodwatchConfig,
    data_dir: Option<PathBuf>,
    store: Arc<ShardedStore>,
    registry: Arc<SearchRegistry>,
    manager: Arc<TransactionManager>,
    index: Arc<dyn SearchIndex>,
    adapter: QueryAdapter,
    observers: Vec<Arc<dyn CommitObserver>>,
    deferred: Option<Arc<DeferredSynchronizer>>,
    jobs: JobQueue,
    search_enabled: bool,
}

impl Database {
    /// Open with defaults
    pub fn open_in_memory() -> Result<Self> {
        DatabaseBuilder::new().build()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Effective configuration
    pub fn config(&self) -> &NodwatchConfig {
        &self.config
    }

    /// Directory the configuration was loaded from
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// The primary store
    pub fn store(&self) -> &Arc<ShardedStore> {
        &self.store
    }

    /// Searchable types
    pub fn registry(&self) -> &SearchRegistry {
        &self.registry
    }

    /// The transaction manager
    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    /// The search index backend
    pub fn index(&self) -> &Arc<dyn SearchIndex> {
        &self.index
    }

    /// Background jobs
    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    /// Whether search is served
    pub fn is_search_enabled(&self) -> bool {
        self.search_enabled
    }

    /// Default search page size
    pub fn per_page(&self) -> usize {
        self.config.search.per_page
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a transaction with the database's commit observers installed
    pub fn begin(&self) -> Transaction {
        Transaction::begin(Arc::clone(&self.manager), self.observers.clone())
    }

    /// Run `f` in a transaction and commit it
    ///
    /// If `f` fails the transaction is aborted and the error returned.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction) -> Result<T>,
    {
        self.transaction_with_outcome(f).map(|(value, _)| value)
    }

    /// Like [`Database::transaction`], also returning the commit outcome
    pub fn transaction_with_outcome<F, T>(&self, f: F) -> Result<(T, CommitOutcome)>
    where
        F: FnOnce(&mut Transaction) -> Result<T>,
    {
        let mut txn = self.begin();
        match f(&mut txn) {
            Ok(value) => {
                let outcome = txn.commit()?;
                Ok((value, outcome))
            }
            Err(e) => {
                if txn.is_active() {
                    txn.abort(e.to_string())?;
                }
                Err(e)
            }
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Committed record by key
    pub fn get(&self, key: &EntityKey) -> Option<Record> {
        self.store.get(key)
    }

    /// Committed typed entity by id
    pub fn get_entity<T: Entity>(&self, id: impl Into<EntityId>) -> Result<Option<Stored<T>>> {
        match self.store.get(&EntityKey::new(T::TYPE_NAME, id)) {
            Some(record) => record.decode::<T>().map(Some),
            None => Ok(None),
        }
    }

    /// Stream committed records of a type in id order
    pub fn scan(&self, entity_type: &str) -> ScanCursor<'_> {
        self.store.scan(entity_type)
    }

    /// Every committed entity of a type, in id order
    pub fn entities<T: Entity>(&self) -> Result<Vec<Stored<T>>> {
        self.store
            .scan(T::TYPE_NAME)
            .map(|record| record.decode::<T>())
            .collect()
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Ranked ids of one result page
    pub fn search(
        &self,
        entity_type: &str,
        query: &str,
        page: usize,
        page_size: usize,
    ) -> Result<SearchPage> {
        self.ensure_search()?;
        self.adapter.search(entity_type, query, page, page_size)
    }

    /// One result page resolved against the store, in rank order
    pub fn search_records(
        &self,
        entity_type: &str,
        query: &str,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<Record>, SearchPage)> {
        let hits = self.search(entity_type, query, page, page_size)?;
        let records = resolve_in_order(self, entity_type, &hits.ids)?;
        Ok((records, hits))
    }

    /// Rebuild the index entries of one searchable type
    ///
    /// Runs with commits blocked, after pending deferred synchronization.
    pub fn reindex(&self, entity_type: &str) -> Result<ReindexReport> {
        self.ensure_search()?;
        let descriptor = self.registry.get(entity_type).ok_or_else(|| {
            Error::invalid_input(format!("{} is not a searchable type", entity_type))
        })?;

        self.flush_index();
        self.manager
            .exclusive(|| reindex(self.store.as_ref(), self.index.as_ref(), descriptor))
    }

    /// Rebuild every searchable type, in type-name order
    pub fn reindex_all(&self) -> Result<Vec<ReindexReport>> {
        self.registry
            .entity_types()
            .iter()
            .map(|entity_type| self.reindex(entity_type))
            .collect()
    }

    /// Wait until deferred index synchronization has caught up
    ///
    /// No-op in inline mode.
    pub fn flush_index(&self) {
        if let Some(deferred) = &self.deferred {
            deferred.flush();
        }
    }

    /// Entries deferred synchronization failed to apply so far
    pub fn deferred_sync_failures(&self) -> u64 {
        self.deferred
            .as_ref()
            .map(|d| d.failed_entries())
            .unwrap_or(0)
    }

    fn ensure_search(&self) -> Result<()> {
        if self.search_enabled {
            Ok(())
        } else {
            Err(Error::SearchUnavailable("search is disabled".into()))
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Finish deferred index work and queued jobs, then stop workers
    pub fn shutdown(&self) {
        self.flush_index();
        self.jobs.shutdown();
    }
}

impl RecordSource for Database {
    fn fetch_many(&self, entity_type: &str, ids: &[EntityId]) -> Result<Vec<Record>> {
        self.store.fetch_many(entity_type, ids)
    }

    fn scan<'a>(&'a self, entity_type: &str) -> Box<dyn Iterator<Item = Record> + 'a> {
        Box::new(self.store.scan(entity_type))
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("data_dir", &self.data_dir)
            .field("store", &self.store)
            .field("search_enabled", &self.search_enabled)
            .field("searchable_types", &self.registry.entity_types())
            .finish()
    }
}
