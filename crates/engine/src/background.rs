//! Background task scheduler.
//!
//! A priority queue drained by a fixed pool of worker threads. Used for
//! deferred index synchronization (one worker, so tasks run in submission
//! order) and for user jobs such as exports.

use nodwatch_core::Result;
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, warn};

/// Priority levels for background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskPriority {
    /// Reindexing and other bulk work
    Low = 0,
    /// User jobs, index sync
    Normal = 1,
    /// Work a caller is blocked on
    High = 2,
}

/// Returned when a task cannot be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Queue is at `max_queue_depth`
    QueueFull,
    /// Scheduler was shut down
    ShutDown,
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::QueueFull => write!(f, "background queue is full"),
            SubmitError::ShutDown => write!(f, "background scheduler is shut down"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Scheduler metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Tasks waiting in the queue
    pub queue_depth: usize,
    /// Tasks being executed right now
    pub active_tasks: usize,
    /// Tasks finished since creation, panicked ones included
    pub tasks_completed: u64,
    /// Worker threads
    pub worker_count: usize,
}

struct TaskEnvelope {
    priority: TaskPriority,
    sequence: u64,
    work: Box<dyn FnOnce() + Send>,
}

impl Eq for TaskEnvelope {}

impl PartialEq for TaskEnvelope {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

// Higher priority first, then older first
impl Ord for TaskEnvelope {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for TaskEnvelope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct SchedulerInner {
    name: String,
    queue: Mutex<BinaryHeap<TaskEnvelope>>,
    work_ready: Condvar,
    drain_cond: Condvar,
    shutdown: AtomicBool,
    sequence: AtomicU64,
    queue_depth: AtomicUsize,
    active_tasks: AtomicUsize,
    max_queue_depth: usize,
    tasks_completed: AtomicU64,
}

/// Fixed-size worker pool with priority ordering.
///
/// Within one priority tasks start in FIFO order; with a single worker they
/// also finish in that order.
pub struct BackgroundScheduler {
    inner: Arc<SchedulerInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
}

impl BackgroundScheduler {
    /// Start a scheduler whose workers are named `<name>-0`, `<name>-1`, ...
    pub fn new(name: &str, num_threads: usize, max_queue_depth: usize) -> Result<Self> {
        let inner = Arc::new(SchedulerInner {
            name: name.to_string(),
            queue: Mutex::new(BinaryHeap::new()),
            work_ready: Condvar::new(),
            drain_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            queue_depth: AtomicUsize::new(0),
            active_tasks: AtomicUsize::new(0),
            max_queue_depth,
            tasks_completed: AtomicU64::new(0),
        });

        let scheduler = Self {
            inner,
            workers: Mutex::new(Vec::with_capacity(num_threads)),
            num_threads,
        };

        for i in 0..num_threads {
            let inner = Arc::clone(&scheduler.inner);
            let spawned = std::thread::Builder::new()
                .name(format!("{}-{}", name, i))
                .spawn(move || worker_loop(&inner));
            match spawned {
                Ok(handle) => scheduler.workers.lock().push(handle),
                Err(e) => {
                    scheduler.shutdown();
                    return Err(e.into());
                }
            }
        }

        Ok(scheduler)
    }

    /// Queue a task.
    pub fn submit(
        &self,
        priority: TaskPriority,
        work: impl FnOnce() + Send + 'static,
    ) -> std::result::Result<(), SubmitError> {
        if self.inner.shutdown.load(AtomicOrdering::Acquire) {
            return Err(SubmitError::ShutDown);
        }
        if self.inner.queue_depth.load(AtomicOrdering::Acquire) >= self.inner.max_queue_depth {
            warn!(
                target: "nodwatch::background",
                scheduler = %self.inner.name,
                depth = self.inner.max_queue_depth,
                "queue full, rejecting task"
            );
            return Err(SubmitError::QueueFull);
        }

        let sequence = self.inner.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        let envelope = TaskEnvelope {
            priority,
            sequence,
            work: Box::new(work),
        };

        {
            let mut queue = self.inner.queue.lock();
            queue.push(envelope);
            self.inner.queue_depth.fetch_add(1, AtomicOrdering::Release);
        }

        self.inner.work_ready.notify_one();
        Ok(())
    }

    /// Block until every queued and running task has finished.
    ///
    /// Workers keep running afterwards.
    pub fn drain(&self) {
        let mut queue = self.inner.queue.lock();
        while self.inner.queue_depth.load(AtomicOrdering::Acquire) > 0
            || self.inner.active_tasks.load(AtomicOrdering::Acquire) > 0
        {
            self.inner.drain_cond.wait(&mut queue);
        }
    }

    /// Stop accepting tasks, run what is queued, then join the workers.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, AtomicOrdering::Release);

        // Notify under the queue lock so a worker between its shutdown check
        // and wait() cannot miss the wakeup.
        {
            let _queue = self.inner.queue.lock();
            self.inner.work_ready.notify_all();
        }

        let current = std::thread::current().id();
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
    }

    /// Check whether shutdown was requested.
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.load(AtomicOrdering::Acquire)
    }

    /// Return a snapshot of scheduler metrics.
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            queue_depth: self.inner.queue_depth.load(AtomicOrdering::Relaxed),
            active_tasks: self.inner.active_tasks.load(AtomicOrdering::Relaxed),
            tasks_completed: self.inner.tasks_completed.load(AtomicOrdering::Relaxed),
            worker_count: self.num_threads,
        }
    }
}

impl Drop for BackgroundScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for BackgroundScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundScheduler")
            .field("name", &self.inner.name)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Decrements `active_tasks` and wakes drain waiters, even if the task panicked.
struct ActiveTaskGuard<'a> {
    inner: &'a SchedulerInner,
}

impl Drop for ActiveTaskGuard<'_> {
    fn drop(&mut self) {
        let prev_active = self.inner.active_tasks.fetch_sub(1, AtomicOrdering::Release);
        self.inner
            .tasks_completed
            .fetch_add(1, AtomicOrdering::Relaxed);

        if prev_active == 1 && self.inner.queue_depth.load(AtomicOrdering::Acquire) == 0 {
            let _queue = self.inner.queue.lock();
            self.inner.drain_cond.notify_all();
        }
    }
}

fn worker_loop(inner: &SchedulerInner) {
    loop {
        let task = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(task) = queue.pop() {
                    inner.queue_depth.fetch_sub(1, AtomicOrdering::Release);
                    inner.active_tasks.fetch_add(1, AtomicOrdering::Release);
                    break task;
                }
                if inner.shutdown.load(AtomicOrdering::Acquire) {
                    return;
                }
                inner.work_ready.wait(&mut queue);
            }
        };

        let _guard = ActiveTaskGuard { inner };

        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task.work)) {
            let message = e
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| e.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "(non-string panic)".to_string());
            error!(
                target: "nodwatch::background",
                scheduler = %inner.name,
                "background task panicked: {}", message
            );
        }
    }
}
