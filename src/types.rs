//! Public and internal types for the exifold API and pipeline.

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Key/value payload of a [`Record`]. Keys are unique; order is irrelevant.
pub type Fields = HashMap<String, String>;

/// Result of one successfully executed task, as handed to the sink.
///
/// `source_id` is always the id of the task that produced it; the pipeline never looks inside `fields`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Record {
    pub source_id: String,
    pub fields: Fields,
}

/// Accounting for one pipeline run. Returned by [`Pipeline::finish`](crate::pipeline::Pipeline::finish).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Tasks accepted by `enqueue`.
    pub enqueued: usize,
    /// Tasks whose capability returned fields.
    pub succeeded: usize,
    /// Tasks whose capability failed or panicked. No record was produced for them.
    pub task_failures: usize,
    /// Records the sink accepted.
    pub persisted: usize,
    /// Records produced but rejected by the sink (lost, but counted).
    pub sink_failures: usize,
    /// End-signals seen by the collector (equals the pool size on a clean run).
    pub end_signals: usize,
    /// Worker or collector threads that died instead of returning their stats.
    pub panicked_threads: usize,
    /// True when the run was cut short by the cancel token.
    pub cancelled: bool,
}

impl Summary {
    /// Tasks enqueued but never executed (only non-zero after cancellation or a thread panic).
    pub fn unexecuted(&self) -> usize {
        self.enqueued
            .saturating_sub(self.succeeded + self.task_failures)
    }

    /// Records that reached neither the store nor the failure count.
    pub fn unaccounted_records(&self) -> usize {
        self.succeeded
            .saturating_sub(self.persisted + self.sink_failures)
    }

    pub fn is_clean(&self) -> bool {
        !self.cancelled
            && self.panicked_threads == 0
            && self.task_failures == 0
            && self.sink_failures == 0
    }
}

/// Full options for a CLI run. Built from `.exifold.toml` and then CLI flags.
#[derive(Clone, Debug, Default)]
pub struct Opts {
    /// Store path. When None, uses `root.join(<package store filename>)` (e.g. `.exifold`).
    pub db_path: Option<PathBuf>,
    /// Worker pool size. When None, derived from available threads and the FD limit.
    pub num_workers: Option<usize>,
    /// Job queue capacity. When None, [`QueueConsts::DEFAULT_JOB_CAPACITY`](crate::utils::config::QueueConsts::DEFAULT_JOB_CAPACITY).
    pub queue_capacity: Option<usize>,
    /// Attempts for listing and reading a source before giving up. When None, [`DEFAULT_MAX_ATTEMPTS`](crate::utils::config::DEFAULT_MAX_ATTEMPTS).
    pub max_attempts: Option<u32>,
    /// Cancel the run when no progress is observed for this many seconds.
    pub stall_timeout_secs: Option<u64>,
    /// Seconds between "tasks left" reports. When None, [`ProgressConsts::DEFAULT_INTERVAL`](crate::utils::config::ProgressConsts::DEFAULT_INTERVAL).
    pub progress_interval_secs: Option<u64>,
    /// Add a blake3 digest field to every record.
    pub with_hash: bool,
    /// Follow symbolic links while listing sources.
    pub follow_links: bool,
    /// Exclude patterns (glob syntax).
    pub exclude: Vec<String>,
    /// Fail on the first unreadable entry while listing instead of skipping it.
    pub strict: bool,
    /// Show a progress bar and debug logs.
    pub verbose: bool,
    /// Print the run summary as JSON.
    pub json: bool,
}
