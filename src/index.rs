//! Directory run: list files, fan them out to the pipeline, store one record per file.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::Path;
use std::time::Duration;

use crate::engine::progress::{Monitor, MonitorConfig};
use crate::engine::source::{RetryPolicy, SourceOpts, file_digest_task, list_sources};
use crate::engine::tools::canonicalize_root;
use crate::engine::{SqliteSink, open_db};
use crate::pipeline::{CancelToken, LogErrorSink, Pipeline, PipelineConfig, PipelineError};
use crate::utils::cap_pool_size;
use crate::utils::config::{PackagePaths, ProgressConsts, QueueConsts, WorkerThreadLimits};
use crate::{Opts, Summary};

/// Pipeline config from opts: explicit worker count wins, otherwise thread count capped by the FD limit.
pub fn pipeline_config(opts: &Opts) -> PipelineConfig {
    let pool_size = match opts.num_workers {
        Some(n) => n.max(1),
        None => cap_pool_size(WorkerThreadLimits::current().default_pool_size()),
    };
    let job_capacity = opts
        .queue_capacity
        .unwrap_or(QueueConsts::DEFAULT_JOB_CAPACITY)
        .max(1);
    PipelineConfig {
        pool_size,
        job_capacity,
        result_capacity: QueueConsts::DEFAULT_RESULT_CAPACITY,
    }
}

fn monitor_config(opts: &Opts, total: usize) -> MonitorConfig {
    let interval = match (opts.progress_interval_secs, opts.verbose) {
        (Some(secs), _) => Duration::from_secs(secs.max(1)),
        (None, true) => ProgressConsts::BAR_INTERVAL,
        (None, false) => ProgressConsts::DEFAULT_INTERVAL,
    };
    MonitorConfig {
        interval,
        stall_timeout: opts.stall_timeout_secs.map(Duration::from_secs),
        show_bar: opts.verbose,
        total,
    }
}

/// Process every file under `root` and store one record per file in the store at `opts.db_path`
/// (default `root/.exifold`). When `cancel` is raised (Ctrl+C, or the stall watchdog), records
/// produced so far are still stored and the returned summary has `cancelled` set.
pub fn index_dir(root: &Path, opts: &Opts, cancel: &CancelToken) -> Result<Summary> {
    let root = canonicalize_root(root)?;
    let db_path = opts
        .db_path
        .clone()
        .unwrap_or_else(|| root.join(PackagePaths::get().output_filename()));
    let conn = open_db(&db_path)?;

    let retry = opts
        .max_attempts
        .map(RetryPolicy::new)
        .unwrap_or_default();
    let source_opts = SourceOpts {
        db_canonical: db_path.canonicalize().ok(),
        exclude: opts.exclude.clone(),
        follow_links: opts.follow_links,
        strict: opts.strict,
    };
    info!("Listing {}", root.display());
    let listing = retry.run("list sources", |_| list_sources(&root, &source_opts))?;
    if !listing.skipped.is_empty() {
        warn!(
            "Skipped {} entries due to permission errors or access issues",
            listing.skipped.len()
        );
        if opts.verbose {
            for (p, msg) in &listing.skipped {
                eprintln!("  skipped: {} ({})", p.display(), msg);
            }
        }
    }
    let total = listing.files.len();
    info!("Files to process: {}", total);

    let config = pipeline_config(opts);
    debug!("{} CONFIG: {:?}", PackagePaths::get().pkg_name().to_uppercase(), config);
    let mut pipeline = Pipeline::new(config, SqliteSink::new(conn), LogErrorSink)
        .with_cancel_token(cancel.clone());
    pipeline.start()?;

    let monitor = pipeline
        .observer()
        .map(|observer| Monitor::spawn(observer, cancel.clone(), monitor_config(opts, total)))
        .transpose()
        .context("spawn progress monitor")?;

    for path in listing.files {
        let task = file_digest_task(&root, path, opts.with_hash, retry);
        match pipeline.enqueue(task) {
            Ok(()) => {}
            Err(PipelineError::Cancelled) => {
                info!("Cancelled while queuing; no more tasks will be enqueued");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let summary = pipeline.finish()?;
    if let Some(monitor) = monitor
        && monitor.stop().stalled
    {
        warn!("Run stopped by the stall watchdog");
    }
    Ok(summary)
}
