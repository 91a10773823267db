//! Load `.exifold.toml` from a directory (CLI only). Lib callers configure the pipeline directly.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct ExifoldToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    db_path: Option<String>,
    workers: Option<usize>,
    queue_capacity: Option<usize>,
    retries: Option<u32>,
    stall_timeout: Option<u64>,
    progress_interval: Option<u64>,
    hash: Option<bool>,
    follow_links: Option<bool>,
    exclude: Option<Vec<String>>,
    strict: Option<bool>,
    verbose: Option<bool>,
    json: Option<bool>,
}

/// Load the package config file from `dir` if present. Returns None if missing, unreadable or invalid.
pub fn load_exifold_toml(dir: &Path) -> Option<ExifoldToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_exifold_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub fn parse_exifold_toml(s: &str) -> Result<ExifoldToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($idx:expr, $opts:expr, $idx_field:ident => $opts_field:ident) => {
        if let Some(v) = $idx.$idx_field {
            $opts.$opts_field = v;
        }
    };
}

/// Same as `apply_file_opt!` for `Option` fields on `Opts`.
macro_rules! apply_file_some {
    ($idx:expr, $opts:expr, $idx_field:ident => $opts_field:ident) => {
        if let Some(v) = $idx.$idx_field {
            $opts.$opts_field = Some(v);
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI flags.
pub fn apply_file_to_opts(file: &ExifoldToml, opts: &mut Opts) {
    let s = &file.settings;
    if let Some(ref p) = s.db_path {
        opts.db_path = Some(PathBuf::from(p));
    }
    apply_file_some!(s, opts, workers => num_workers);
    apply_file_some!(s, opts, queue_capacity => queue_capacity);
    apply_file_some!(s, opts, retries => max_attempts);
    apply_file_some!(s, opts, stall_timeout => stall_timeout_secs);
    apply_file_some!(s, opts, progress_interval => progress_interval_secs);
    apply_file_opt!(s, opts, hash => with_hash);
    apply_file_opt!(s, opts, follow_links => follow_links);
    if let Some(ref v) = s.exclude {
        opts.exclude = v.clone();
    }
    apply_file_opt!(s, opts, strict => strict);
    apply_file_opt!(s, opts, verbose => verbose);
    apply_file_opt!(s, opts, json => json);
}
