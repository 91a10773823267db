//! File source: lists work items under a directory and builds the tasks that read them.
//!
//! Retries live here, not in the pool: listing and each file read go through a
//! [`RetryPolicy`] before the pipeline ever sees a success or a failure.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

use crate::Fields;
use crate::engine::hashing::hash_file_hex;
use crate::engine::tools::{path_relative_to, path_to_source_id, should_include_source};
use crate::pipeline::Task;
use crate::utils::config::{DEFAULT_MAX_ATTEMPTS, PackagePaths};

/// Bounded retry: run an operation up to `max_attempts` times, returning the last error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run `op` (given the 1-based attempt number) until it succeeds or attempts run out.
    pub fn run<T, F>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) if attempt < max => {
                    warn!("{}: attempt {}/{} failed: {:#}", label, attempt, max, e);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e.context(format!("{} failed after {} attempts", label, max)));
                }
            }
        }
    }
}

/// Listing options for [`list_sources`].
#[derive(Clone, Debug, Default)]
pub struct SourceOpts {
    /// Store file to leave out of the listing (canonical path).
    pub db_canonical: Option<PathBuf>,
    /// Exclude patterns (glob syntax), added to the package defaults.
    pub exclude: Vec<String>,
    pub follow_links: bool,
    /// Fail on the first unreadable entry instead of skipping it.
    pub strict: bool,
}

/// Outcome of a listing: the files to process and the entries that were skipped.
#[derive(Debug, Default)]
pub struct SourceListing {
    pub files: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, String)>,
}

/// Walk `root` and return every regular file that should become a task, sorted.
pub fn list_sources(root: &Path, opts: &SourceOpts) -> Result<SourceListing> {
    let mut exclude = PackagePaths::get().default_exclude_patterns();
    exclude.extend(opts.exclude.iter().cloned());
    if let Some(name) = opts
        .db_canonical
        .as_deref()
        .and_then(|db| db.file_name())
        .and_then(|n| n.to_str())
    {
        exclude.push(format!("{name}-wal"));
        exclude.push(format!("{name}-shm"));
    }

    let mut listing = SourceListing::default();
    for entry in WalkDir::new(root).follow_links(opts.follow_links) {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.into_path();
                if should_include_source(&path, root, &opts.db_canonical, &exclude) {
                    listing.files.push(path);
                }
            }
            Err(err) => {
                let path = err.path().map(PathBuf::from).unwrap_or_default();
                if opts.strict {
                    return Err(anyhow::anyhow!("strict mode: {} (path: {:?})", err, path));
                }
                warn!("Skipping unreadable entry: {}", err);
                listing.skipped.push((path, err.to_string()));
            }
        }
    }
    listing.files.sort();
    debug!(
        "Listed {} sources under {} ({} skipped)",
        listing.files.len(),
        root.display(),
        listing.skipped.len()
    );
    Ok(listing)
}

/// Read one file's metadata (and optional digest) into record fields.
pub fn read_file_fields(root: &Path, abs_path: &Path, with_hash: bool) -> Result<Fields> {
    let meta = std::fs::metadata(abs_path)
        .with_context(|| format!("read metadata of {}", abs_path.display()))?;
    let mtime_ns = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0);
    let rel = path_relative_to(abs_path, root).unwrap_or_else(|| abs_path.to_path_buf());

    let mut fields = Fields::new();
    fields.insert("path".into(), path_to_source_id(&rel));
    fields.insert("size".into(), meta.len().to_string());
    fields.insert("mtime_ns".into(), mtime_ns.to_string());
    if let Some(ext) = abs_path.extension().and_then(|e| e.to_str()) {
        fields.insert("extension".into(), ext.to_ascii_lowercase());
    }
    if with_hash {
        fields.insert("blake3".into(), hash_file_hex(abs_path, meta.len())?);
    }
    Ok(fields)
}

/// Task for one file. The id is the path relative to `root`; reads are retried per `retry`.
pub fn file_digest_task(root: &Path, abs_path: PathBuf, with_hash: bool, retry: RetryPolicy) -> Task {
    let rel = path_relative_to(&abs_path, root).unwrap_or_else(|| abs_path.clone());
    let id = path_to_source_id(&rel);
    let root = root.to_path_buf();
    let label = format!("read {}", id);
    Task::new(id, move || {
        retry.run(&label, |_| read_file_fields(&root, &abs_path, with_hash))
    })
}
