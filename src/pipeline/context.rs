//! Pipeline configuration and read-only progress observation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::Record;
use crate::utils::config::{QueueConsts, WorkerThreadLimits};

use super::queue::QueueRx;
use super::task::Task;

/// Pool size and queue bounds, fixed for the lifetime of a pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of workers. Also the number of end-signals `close` pushes.
    pub pool_size: usize,
    /// Job queue bound; `enqueue` blocks once this many tasks wait.
    pub job_capacity: usize,
    /// Result queue bound; workers block once the collector falls this far behind.
    pub result_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pool_size: WorkerThreadLimits::current().default_pool_size(),
            job_capacity: QueueConsts::DEFAULT_JOB_CAPACITY,
            result_capacity: QueueConsts::DEFAULT_RESULT_CAPACITY,
        }
    }
}

impl PipelineConfig {
    pub fn with_pool_size(pool_size: usize) -> Self {
        Self {
            pool_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.pool_size == 0 {
            return Err("pool_size must be at least 1".into());
        }
        if self.job_capacity == 0 || self.result_capacity == 0 {
            return Err("queue capacities must be at least 1".into());
        }
        Ok(())
    }
}

/// Task counts shared by the producer, the workers and any observer.
#[derive(Debug, Default)]
pub(crate) struct TaskCounters {
    enqueued: AtomicUsize,
    completed: AtomicUsize,
}

impl TaskCounters {
    pub(crate) fn task_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// A worker finished a task, successfully or not.
    pub(crate) fn task_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Advisory snapshot of a running pipeline. Read without a lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    /// Tasks accepted by `enqueue` so far.
    pub enqueued: usize,
    /// Tasks a worker has finished, failures included.
    pub completed: usize,
    /// Tasks waiting in the job queue (end-signals included once `close` ran).
    pub queued: usize,
    /// Records waiting for the collector.
    pub pending_results: usize,
    pub active_workers: usize,
    pub collector_running: bool,
}

impl Progress {
    /// True once every worker and the collector have exited.
    pub fn is_finished(&self) -> bool {
        self.active_workers == 0 && !self.collector_running
    }

    /// Tasks enqueued but not finished yet (queued or running).
    pub fn outstanding(&self) -> usize {
        self.enqueued.saturating_sub(self.completed)
    }

    /// Tasks left out of `total`, counting those the producer has not enqueued yet.
    pub fn remaining_of(&self, total: usize) -> usize {
        total.saturating_sub(self.completed)
    }
}

/// Cloneable read-only view of a started pipeline, for a monitoring thread.
#[derive(Clone)]
pub struct ProgressObserver {
    pub(crate) jobs: QueueRx<Task>,
    pub(crate) results: QueueRx<Record>,
    pub(crate) workers: Weak<()>,
    pub(crate) collector: Weak<()>,
    pub(crate) counters: Arc<TaskCounters>,
}

impl ProgressObserver {
    pub fn snapshot(&self) -> Progress {
        Progress {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            queued: self.jobs.len(),
            pending_results: self.results.len(),
            active_workers: self.workers.strong_count(),
            collector_running: self.collector.strong_count() > 0,
        }
    }
}
