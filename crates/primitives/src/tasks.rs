//! Tasks: user-visible records of background jobs
//!
//! A task shares its id with the job that does the work. Launching a task
//! queues the job and stores the task; when the job returns `Ok`, the task
//! is marked complete in a separate transaction.
//!
//! # Design
//!
//! The job holds only a `Weak<Database>`, so a queued job never keeps the
//! database alive, and dropping the last handle from a worker is avoided.

use nodwatch_core::{Entity, Error, Result, Stored};
use nodwatch_engine::{Database, JobContext, JobStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// A background job as seen by its owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub user_id: i64,
    #[serde(default)]
    pub complete: bool,
}

impl Entity for Task {
    const TYPE_NAME: &'static str = "task";
}

/// Task facade
#[derive(Clone)]
pub struct TaskBoard {
    db: Arc<Database>,
}

impl TaskBoard {
    /// Create a new task facade
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Queue `work` as a job and record a task for it
    ///
    /// Returns the stored task; its id is the job id.
    pub fn launch<F>(
        &self,
        user_id: i64,
        name: &str,
        description: Option<&str>,
        work: F,
    ) -> Result<Stored<Task>>
    where
        F: FnOnce(&JobContext) -> Result<()> + Send + 'static,
    {
        // Held until the task row is committed; the job waits on it before
        // marking the task complete.
        let committed = Arc::new(Mutex::new(()));
        let held = committed.lock();

        let db = Arc::downgrade(&self.db);
        let gate = Arc::clone(&committed);
        let job_id = self.db.jobs().enqueue(name, move |ctx| {
            work(ctx)?;
            drop(gate.lock());
            mark_complete(&db, ctx.job_id())
        })?;

        let task = Task {
            name: name.to_string(),
            description: description.map(str::to_string),
            user_id,
            complete: false,
        };
        let stored = self
            .db
            .transaction(|txn| {
                txn.insert_entity_with_id(job_id.as_str(), &task)?;
                Ok(())
            })
            .and_then(|()| self.get(&job_id));
        drop(held);

        let stored = stored?.ok_or_else(|| {
            Error::Storage(format!("task {} missing after commit", job_id))
        })?;
        info!(target: "nodwatch::tasks", job_id = %job_id, name, user_id, "task launched");
        Ok(stored)
    }

    /// Load a task by id
    pub fn get(&self, task_id: &str) -> Result<Option<Stored<Task>>> {
        self.db.get_entity::<Task>(task_id)
    }

    /// The user's incomplete tasks, in id order
    pub fn in_progress(&self, user_id: i64) -> Result<Vec<Stored<Task>>> {
        Ok(self
            .db
            .entities::<Task>()?
            .into_iter()
            .filter(|t| t.user_id == user_id && !t.complete)
            .collect())
    }

    /// First incomplete task of the user with this name
    pub fn in_progress_named(&self, user_id: i64, name: &str) -> Result<Option<Stored<Task>>> {
        Ok(self
            .in_progress(user_id)?
            .into_iter()
            .find(|t| t.name == name))
    }

    /// Job progress in percent; 100 if the queue does not know the job
    pub fn progress(&self, task_id: &str) -> u8 {
        self.db.jobs().progress(task_id).unwrap_or(100)
    }

    /// Job status, `None` if the queue does not know the job
    pub fn job_status(&self, task_id: &str) -> Option<JobStatus> {
        self.db.jobs().status(task_id)
    }
}

fn mark_complete(db: &Weak<Database>, task_id: &str) -> Result<()> {
    let db = match db.upgrade() {
        Some(db) => db,
        None => {
            debug!(target: "nodwatch::tasks", task_id, "database closed before task completed");
            return Ok(());
        }
    };

    db.transaction(|txn| match txn.get_entity::<Task>(task_id)? {
        Some(stored) => {
            let mut task = stored.value;
            task.complete = true;
            txn.update_entity(task_id, &task)
        }
        None => {
            debug!(target: "nodwatch::tasks", task_id, "no task row for finished job");
            Ok(())
        }
    })
}
