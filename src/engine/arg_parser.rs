use clap::Parser;
use std::path::PathBuf;

use crate::utils::config::PackagePaths;

struct DefaultArgs;

impl DefaultArgs {
    pub const DIR: &'static str = ".";
}

/// Fan every file under a directory out to a worker pool and fold the results into one store.
#[derive(Clone, Parser)]
#[command(name = "exifold")]
#[command(about = "Process every file under DIR in parallel and store one key/value record per file.")]
pub struct Cli {
    /// Directory to process. Default: current directory.
    #[arg(value_name = "DIR", default_value = DefaultArgs::DIR)]
    pub dir: PathBuf,

    /// Path to the store. Default: `.exifold` in DIR.
    #[arg(long, short)]
    pub db: Option<PathBuf>,

    /// Number of workers. Default: available threads, capped by the open-file limit.
    #[arg(long, short = 'w', value_parser = clap::value_parser!(usize))]
    pub workers: Option<usize>,

    /// Job queue capacity; enqueueing blocks once this many tasks are waiting.
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub queue_capacity: Option<usize>,

    /// Attempts for listing DIR and reading each file before giving up.
    #[arg(long, value_parser = clap::value_parser!(u32))]
    pub retries: Option<u32>,

    /// Cancel the run after this many seconds without observable progress.
    #[arg(long, value_parser = clap::value_parser!(u64))]
    pub stall_timeout: Option<u64>,

    /// Seconds between "tasks left" reports.
    #[arg(long, value_parser = clap::value_parser!(u64))]
    pub progress_interval: Option<u64>,

    /// Add a blake3 digest to every record (slower).
    #[arg(long, short = 'c', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub check_hash: Option<bool>,

    /// Follow symbolic links.
    #[arg(long, short = 'f', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub follow_links: Option<bool>,

    /// Exclude patterns (glob syntax). Can specify multiple: -e pattern1 pattern2 pattern3
    #[arg(long, short = 'e', num_args = 1..)]
    pub exclude: Vec<String>,

    /// Strict mode: fail on the first unreadable entry instead of skipping it.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub strict: Option<bool>,

    /// Print the run summary as JSON.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub json: Option<bool>,

    /// Verbose output (progress bar, debug logs).
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

impl Cli {
    /// Get the store path, defaulting to the package store filename in the target directory.
    pub fn db_path(&self) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(|| self.dir.join(PackagePaths::get().output_filename()))
    }
}
