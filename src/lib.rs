//! Nodwatch: a patient tracking data core with commit-synchronized search.
//!
//! The primary store is the source of truth. Every committed transaction
//! hands its searchable changes to the index synchronizer, so searches see
//! what was committed and nothing that was rolled back.
//!
//! # Example
//!
//! ```
//! use nodwatch::{Nodwatch, Post};
//!
//! let app = Nodwatch::open_in_memory().unwrap();
//! app.posts().create(&Post::new(1, "MUAC 11.2cm, refer to clinic")).unwrap();
//!
//! let results = app.posts().search("clinic", 1).unwrap();
//! assert_eq!(results.total, 1);
//! assert_eq!(results.items[0].user_id, 1);
//! ```

#![warn(missing_docs)]

use std::path::Path;
use std::sync::Arc;

pub use nodwatch_concurrency::{
    CapturedChanges, ChangeKind, ChangeSet, CommitObserver, CommitOutcome, ObserverFailure,
    Transaction, TransactionStatus,
};
pub use nodwatch_core::{
    Entity, EntityId, EntityKey, Error, FieldValues, Record, RecordSource, Result,
    SearchDescriptor, SearchRegistry, Stored,
};
pub use nodwatch_engine::{
    Database, DatabaseBuilder, IndexError, IndexHits, JobContext, JobStatus, MemoryIndex,
    NodwatchConfig, ReindexReport, SearchIndex, SearchPage, SyncMode, CONFIG_FILE_NAME,
};
pub use nodwatch_primitives::{
    Message, Messages, Notification, Notifications, Post, PostStore, ReadMark, Task, TaskBoard,
    Waypoint, WaypointStore, UNREAD_MESSAGE_COUNT,
};
pub use nodwatch_search::{DatabaseSearchExt, EntitySearch, SearchResults};

/// A builder with every domain entity registered
pub fn domain_builder() -> DatabaseBuilder {
    DatabaseBuilder::new()
        .register::<Post>()
        .register::<Waypoint>()
        .register::<Task>()
        .register::<Notification>()
        .register::<Message>()
        .register::<ReadMark>()
}

/// Handle bundling the database and the domain facades
#[derive(Clone)]
pub struct Nodwatch {
    db: Arc<Database>,
    posts: PostStore,
    waypoints: WaypointStore,
    tasks: TaskBoard,
    notifications: Notifications,
    messages: Messages,
}

impl Nodwatch {
    /// Open with default configuration
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Arc::new(domain_builder().build()?)))
    }

    /// Open with the configuration in `<dir>/nodwatch.toml`, creating it if missing
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let db = domain_builder().data_dir(dir)?.build()?;
        Ok(Self::from_database(Arc::new(db)))
    }

    /// Open with an explicit configuration
    pub fn with_config(config: NodwatchConfig) -> Result<Self> {
        let db = domain_builder().config(config).build()?;
        Ok(Self::from_database(Arc::new(db)))
    }

    /// Wrap a database built elsewhere
    ///
    /// The database should have the domain entities registered, see
    /// [`domain_builder`].
    pub fn from_database(db: Arc<Database>) -> Self {
        let notifications = Notifications::new(Arc::clone(&db));
        Nodwatch {
            posts: PostStore::new(Arc::clone(&db)),
            waypoints: WaypointStore::new(Arc::clone(&db)),
            tasks: TaskBoard::new(Arc::clone(&db)),
            messages: Messages::new(Arc::clone(&db), notifications.clone()),
            notifications,
            db,
        }
    }

    /// The underlying database
    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Visit notes
    pub fn posts(&self) -> &PostStore {
        &self.posts
    }

    /// Map waypoints
    pub fn waypoints(&self) -> &WaypointStore {
        &self.waypoints
    }

    /// Background tasks
    pub fn tasks(&self) -> &TaskBoard {
        &self.tasks
    }

    /// Per-user notifications
    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    /// Messages between caregivers
    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    /// Typed search over any registered entity
    pub fn search(&self) -> EntitySearch {
        self.db.entity_search()
    }

    /// Rebuild the whole search index from the store
    pub fn reindex_all(&self) -> Result<Vec<ReindexReport>> {
        self.db.reindex_all()
    }
}

impl std::fmt::Debug for Nodwatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Nodwatch").field("db", &self.db).finish()
    }
}
