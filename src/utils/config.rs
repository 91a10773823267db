//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived paths: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    db_filename: String,
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache paths from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                db_filename: format!(".{pkg}"),
                config_filename: format!(".{pkg}.toml"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Default store filename, created inside the processed directory.
    pub fn output_filename(&self) -> &str {
        &self.db_filename
    }

    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Names never handed to the pool: our own store, its WAL/SHM files and the config file.
    pub fn default_exclude_patterns(&self) -> Vec<String> {
        vec![
            self.db_filename.clone(),
            format!("{}-wal", self.db_filename),
            format!("{}-shm", self.db_filename),
            self.config_filename.clone(),
        ]
    }
}

// ---- Worker threads ----

/// Bounds for the worker pool size when the caller does not pick one.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    /// Available threads (from rayon); set by [`WorkerThreadLimits::current()`].
    pub all_threads: usize,
    /// Never run fewer workers than this.
    pub floor: usize,
    /// Never run more workers than this by default (I/O bound tasks gain little past it).
    pub max: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from rayon
            floor: Self::FLOOR_THREADS,
            max: Self::MAX_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const FLOOR_THREADS: usize = 2;
    pub const MAX_THREADS: usize = 32;

    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }

    /// Default pool size: available threads clamped to `[floor, max]`.
    pub fn default_pool_size(&self) -> usize {
        self.all_threads.clamp(self.floor, self.max)
    }
}

// ---- Queues ----

/// Queue capacities and the cancellation poll interval.
pub struct QueueConsts;

impl QueueConsts {
    /// Default job queue capacity. Producers block once this many tasks are waiting.
    pub const DEFAULT_JOB_CAPACITY: usize = 1024;
    /// Default result queue capacity. Workers block once the collector falls this far behind.
    pub const DEFAULT_RESULT_CAPACITY: usize = 1024;
    /// How often a blocked push/pop re-checks the cancel token.
    pub const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);
}

// ---- Retries ----

/// Attempts made by the task-source collaborator before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

// ---- Progress ----

/// Progress reporting and stall detection.
pub struct ProgressConsts;

impl ProgressConsts {
    /// How often the monitor polls queue depth and reports "tasks left".
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
    /// Poll interval used while the progress bar is shown.
    pub const BAR_INTERVAL: Duration = Duration::from_millis(250);
}

// ---- Hashing ----

/// Hashing I/O thresholds and buffer sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// File size above which hashing uses memory-mapped I/O (bytes). 100 MB.
    pub const HASH_MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;
    /// Chunk size for reading files below mmap threshold (bytes). 1 MB.
    pub const HASH_READ_CHUNK_SIZE: usize = 1024 * 1024;
}
