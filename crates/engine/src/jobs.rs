//! Background jobs with progress reporting
//!
//! Jobs run on a [`BackgroundScheduler`] pool. Each job gets a [`JobContext`]
//! through which it publishes progress as a percentage; callers poll it by
//! job id. Job ids are UUIDs.

use crate::background::{BackgroundScheduler, SchedulerStats, TaskPriority};
use dashmap::DashMap;
use nodwatch_core::{Error, Result};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Lifecycle of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Waiting for a worker
    Queued,
    /// Being executed
    Running,
    /// Returned `Ok`
    Finished,
    /// Returned an error or panicked
    Failed(String),
}

impl JobStatus {
    /// True once the job will not run any more
    pub fn is_done(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed(_))
    }
}

#[derive(Debug, Clone)]
struct JobState {
    name: String,
    status: JobStatus,
    progress: u8,
}

type JobTable = Arc<DashMap<String, JobState>>;

/// Handle given to a running job
pub struct JobContext {
    job_id: String,
    jobs: JobTable,
}

impl JobContext {
    /// Id of the running job
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Publish progress; values above 100 are clamped
    pub fn set_progress(&self, percent: u8) {
        if let Some(mut state) = self.jobs.get_mut(&self.job_id) {
            state.progress = percent.min(100);
        }
    }

    /// Last published progress
    pub fn progress(&self) -> u8 {
        self.jobs
            .get(&self.job_id)
            .map(|s| s.progress)
            .unwrap_or(0)
    }
}

/// Named jobs on a worker pool
pub struct JobQueue {
    scheduler: BackgroundScheduler,
    jobs: JobTable,
}

impl JobQueue {
    /// Start a queue with `workers` threads
    pub fn new(workers: usize, max_queue_depth: usize) -> Result<Self> {
        Ok(JobQueue {
            scheduler: BackgroundScheduler::new("nodwatch-job", workers, max_queue_depth)?,
            jobs: Arc::new(DashMap::new()),
        })
    }

    /// Queue a job, returning its id
    pub fn enqueue<F>(&self, name: &str, work: F) -> Result<String>
    where
        F: FnOnce(&JobContext) -> Result<()> + Send + 'static,
    {
        let job_id = Uuid::new_v4().to_string();
        self.jobs.insert(
            job_id.clone(),
            JobState {
                name: name.to_string(),
                status: JobStatus::Queued,
                progress: 0,
            },
        );

        let ctx = JobContext {
            job_id: job_id.clone(),
            jobs: Arc::clone(&self.jobs),
        };
        let submitted = self
            .scheduler
            .submit(TaskPriority::Normal, move || run_job(ctx, work));

        if let Err(e) = submitted {
            self.jobs.remove(&job_id);
            return Err(Error::invalid_operation(format!(
                "cannot queue job {}: {}",
                name, e
            )));
        }
        debug!(target: "nodwatch::jobs", job_id = %job_id, name, "job queued");
        Ok(job_id)
    }

    /// Last published progress of a job, `None` if the id is unknown
    pub fn progress(&self, job_id: &str) -> Option<u8> {
        self.jobs.get(job_id).map(|s| s.progress)
    }

    /// Status of a job
    pub fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.get(job_id).map(|s| s.status.clone())
    }

    /// Name a job was queued under
    pub fn name(&self, job_id: &str) -> Option<String> {
        self.jobs.get(job_id).map(|s| s.name.clone())
    }

    /// Block until every queued job has run
    pub fn wait_idle(&self) {
        self.scheduler.drain();
    }

    /// Run queued jobs, then stop the workers
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    /// Scheduler metrics
    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("jobs", &self.jobs.len())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

fn set_status(jobs: &JobTable, job_id: &str, status: JobStatus) {
    if let Some(mut state) = jobs.get_mut(job_id) {
        if status == JobStatus::Finished {
            state.progress = 100;
        }
        state.status = status;
    }
}

fn run_job<F>(ctx: JobContext, work: F)
where
    F: FnOnce(&JobContext) -> Result<()>,
{
    set_status(&ctx.jobs, &ctx.job_id, JobStatus::Running);

    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| work(&ctx)));
    let status = match outcome {
        Ok(Ok(())) => JobStatus::Finished,
        Ok(Err(e)) => {
            warn!(target: "nodwatch::jobs", job_id = %ctx.job_id, "job failed: {}", e);
            JobStatus::Failed(e.to_string())
        }
        Err(_) => {
            error!(target: "nodwatch::jobs", job_id = %ctx.job_id, "job panicked");
            JobStatus::Failed("job panicked".to_string())
        }
    };
    set_status(&ctx.jobs, &ctx.job_id, status);
}
