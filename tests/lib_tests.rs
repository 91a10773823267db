//! Library tests: path filters, retry, source listing, file tasks, hashing, config file,
//! progress monitor and full directory runs.

use exifold::engine::source::read_file_fields;
use exifold::engine::{
    Monitor, MonitorConfig, RetryPolicy, SourceOpts, StallWatch, file_digest_task,
    find_by_field, glob_match, hash_file_hex, list_sources, load_record, open_db,
    path_relative_to, path_to_source_id, record_count, should_include_source,
};
use exifold::index::{index_dir, pipeline_config};
use exifold::utils::{apply_file_to_opts, parse_exifold_toml};
use exifold::{
    CancelToken, Fields, LogErrorSink, Opts, Pipeline, PipelineConfig, Progress, Record, Task,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn write(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

fn rel_names(root: &Path, files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|p| path_to_source_id(&path_relative_to(p, root).unwrap()))
        .collect()
}

#[test]
fn test_glob_match() {
    assert!(glob_match("*.log", "debug.log"));
    assert!(glob_match("*.log", ".log"));
    assert!(!glob_match("*.log", "debug.txt"));
    assert!(glob_match("file?.txt", "file1.txt"));
    assert!(!glob_match("file?.txt", "file12.txt"));
    assert!(glob_match("*cache*", "my_cache_dir"));
    assert!(glob_match("a*b*c", "axxbyyc"));
    assert!(!glob_match("a*b*c", "axxbyy"));
    assert!(glob_match("exact", "exact"));
    assert!(!glob_match("exact", "exactly"));
    assert!(glob_match("!*.tmp", "x.tmp"));
}

#[test]
fn test_should_include_source() {
    let root = Path::new("/data");
    let db = Some(PathBuf::from("/data/.exifold"));
    let exclude = vec!["*.tmp".to_string()];

    assert!(should_include_source(Path::new("/data/a.txt"), root, &db, &exclude));
    assert!(!should_include_source(root, root, &db, &exclude));
    assert!(!should_include_source(Path::new("/data/.exifold"), root, &db, &exclude));
    assert!(!should_include_source(Path::new("/data/scratch.tmp"), root, &db, &exclude));
    assert!(!should_include_source(Path::new("/data/.DS_Store"), root, &None, &[]));
    assert!(!should_include_source(Path::new("/data/._a.txt"), root, &None, &[]));
    assert!(should_include_source(Path::new("/data/scratch.tmp"), root, &None, &[]));
}

#[test]
fn test_source_id_uses_forward_slashes() {
    assert_eq!(path_to_source_id(Path::new("a/b/c.txt")), "a/b/c.txt");
    assert_eq!(path_to_source_id(Path::new(r"a\b\c.txt")), "a/b/c.txt");
    assert_eq!(
        path_relative_to(Path::new("/data/a/b.txt"), Path::new("/data")),
        Some(PathBuf::from("a/b.txt"))
    );
    assert_eq!(
        path_relative_to(Path::new("/other/b.txt"), Path::new("/data")),
        None
    );
}

#[test]
fn test_retry_succeeds_on_later_attempt() {
    let mut seen = Vec::new();
    let out = RetryPolicy::new(3)
        .run("flaky", |attempt| {
            seen.push(attempt);
            if attempt < 3 {
                anyhow::bail!("attempt {attempt} failed");
            }
            Ok(attempt * 10)
        })
        .unwrap();
    assert_eq!(out, 30);
    assert_eq!(seen, vec![1, 2, 3]);
}

#[test]
fn test_retry_gives_up_after_max_attempts() {
    let mut calls = 0;
    let err = RetryPolicy::new(2)
        .run::<(), _>("broken", |_| {
            calls += 1;
            anyhow::bail!("still broken")
        })
        .unwrap_err();
    assert_eq!(calls, 2);
    let msg = format!("{:#}", err);
    assert!(msg.contains("broken failed after 2 attempts"), "{msg}");
    assert!(msg.contains("still broken"), "{msg}");
}

#[test]
fn test_retry_policy_bounds() {
    assert_eq!(RetryPolicy::new(0).max_attempts, 1);
    assert_eq!(RetryPolicy::default().max_attempts, 3);
}

#[test]
fn test_list_sources_applies_default_and_user_excludes() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "b.txt", "b");
    write(&root, "a.txt", "a");
    write(&root, "sub/c.jpg", "c");
    write(&root, "sub/skip.tmp", "t");
    write(&root, ".exifold", "store");
    write(&root, ".exifold-wal", "wal");
    write(&root, ".exifold.toml", "[settings]");
    write(&root, ".DS_Store", "");

    let opts = SourceOpts {
        exclude: vec!["*.tmp".into()],
        ..SourceOpts::default()
    };
    let listing = list_sources(&root, &opts).unwrap();
    assert!(listing.skipped.is_empty());
    assert_eq!(
        rel_names(&root, &listing.files),
        vec!["a.txt", "b.txt", "sub/c.jpg"]
    );
}

#[test]
fn test_read_file_fields() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let path = write(&root, "docs/Report.PDF", "hello world");

    let plain = read_file_fields(&root, &path, false).unwrap();
    assert_eq!(plain.get("path").map(String::as_str), Some("docs/Report.PDF"));
    assert_eq!(plain.get("size").map(String::as_str), Some("11"));
    assert_eq!(plain.get("extension").map(String::as_str), Some("pdf"));
    assert!(plain.contains_key("mtime_ns"));
    assert!(!plain.contains_key("blake3"));

    let hashed = read_file_fields(&root, &path, true).unwrap();
    let expected = blake3::hash(b"hello world").to_hex().to_string();
    assert_eq!(hashed.get("blake3"), Some(&expected));
}

#[test]
fn test_file_digest_task_id_and_missing_file() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let path = write(&root, "a/b.txt", "x");

    let task = file_digest_task(&root, path.clone(), false, RetryPolicy::new(1));
    assert_eq!(task.id(), "a/b.txt");

    fs::remove_file(&path).unwrap();
    let gone = file_digest_task(&root, path, false, RetryPolicy::new(2));
    let summary = exifold::run_tasks(
        exifold::PipelineConfig::with_pool_size(1),
        vec![task, gone],
        |_: &exifold::Record| -> anyhow::Result<()> { Ok(()) },
        exifold::LogErrorSink,
    )
    .unwrap();
    // Both tasks point at the removed file.
    assert_eq!(summary.task_failures, 2);
    assert_eq!(summary.persisted, 0);
}

#[test]
fn test_config_file_then_defaults() {
    let file = parse_exifold_toml(
        r#"
[settings]
workers = 3
queue_capacity = 16
retries = 5
stall_timeout = 30
hash = true
exclude = ["*.bak"]
"#,
    )
    .unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts);
    assert_eq!(opts.num_workers, Some(3));
    assert_eq!(opts.queue_capacity, Some(16));
    assert_eq!(opts.max_attempts, Some(5));
    assert_eq!(opts.stall_timeout_secs, Some(30));
    assert!(opts.with_hash);
    assert_eq!(opts.exclude, vec!["*.bak".to_string()]);
    assert!(!opts.follow_links);
    assert!(opts.db_path.is_none());

    let config = pipeline_config(&opts);
    assert_eq!(config.pool_size, 3);
    assert_eq!(config.job_capacity, 16);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_file_rejects_wrong_types() {
    assert!(parse_exifold_toml("[settings]\nworkers = \"many\"").is_err());
    assert!(parse_exifold_toml("").is_ok());
}

#[test]
fn test_stall_watch() {
    let start = Instant::now();
    let busy = Progress {
        enqueued: 5,
        completed: 0,
        queued: 5,
        pending_results: 0,
        active_workers: 2,
        collector_running: true,
    };
    let mut watch = StallWatch::new(Some(Duration::from_secs(10)));
    assert!(!watch.observe(busy, start));
    assert!(!watch.observe(busy, start + Duration::from_secs(5)));
    assert!(watch.observe(busy, start + Duration::from_secs(11)));

    // Any change resets the clock.
    let moved = Progress { queued: 4, ..busy };
    assert!(!watch.observe(moved, start + Duration::from_secs(12)));
    assert!(!watch.observe(moved, start + Duration::from_secs(20)));

    let mut never = StallWatch::new(None);
    assert!(!never.observe(busy, start));
    assert!(!never.observe(busy, start + Duration::from_secs(3600)));
}

#[test]
fn test_index_dir_end_to_end() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root, "one.txt", "1");
    write(&root, "two.txt", "22");
    write(&root, "nested/three.md", "333");
    write(&root, "nested/ignored.bak", "x");

    let opts = Opts {
        num_workers: Some(2),
        with_hash: true,
        exclude: vec!["*.bak".into()],
        ..Opts::default()
    };
    let summary = index_dir(&root, &opts, &CancelToken::new()).unwrap();
    assert_eq!(summary.enqueued, 3);
    assert_eq!(summary.persisted, 3);
    assert!(summary.is_clean());

    let conn = open_db(&root.join(".exifold")).unwrap();
    assert_eq!(record_count(&conn).unwrap(), 3);
    let fields = load_record(&conn, "nested/three.md").unwrap().unwrap();
    assert_eq!(fields.get("size").map(String::as_str), Some("3"));
    assert!(fields.contains_key("blake3"));
    assert_eq!(find_by_field(&conn, "extension", "txt").unwrap(), vec!["one.txt", "two.txt"]);

    // A second run over the same directory replaces rather than duplicates.
    let again = index_dir(&root, &opts, &CancelToken::new()).unwrap();
    assert_eq!(again.persisted, 3);
    assert_eq!(record_count(&conn).unwrap(), 3);
}

#[test]
fn test_index_dir_with_raised_token_reports_cancelled() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    for i in 0..20 {
        write(&root, &format!("f{i}.txt"), "x");
    }
    let cancel = CancelToken::new();
    cancel.cancel();
    let opts = Opts {
        num_workers: Some(2),
        db_path: Some(root.join("custom.db")),
        ..Opts::default()
    };
    let summary = index_dir(&root, &opts, &cancel).unwrap();
    assert!(summary.cancelled);
    assert!(summary.persisted <= summary.enqueued);
    assert!(root.join("custom.db").exists());
}

#[test]
fn test_index_dir_rejects_missing_root() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(index_dir(&missing, &Opts::default(), &CancelToken::new()).is_err());
}

#[test]
fn test_hash_file_hex_streams_small_files() {
    let dir = tempdir().unwrap();
    let empty = write(dir.path(), "empty", "");
    let text = write(dir.path(), "text", "exifold");
    assert_eq!(
        hash_file_hex(&empty, 0).unwrap(),
        blake3::hash(b"").to_hex().to_string()
    );
    assert_eq!(
        hash_file_hex(&text, 7).unwrap(),
        blake3::hash(b"exifold").to_hex().to_string()
    );
    assert!(hash_file_hex(&dir.path().join("missing"), 0).is_err());
}

#[test]
fn test_monitor_cancels_a_stalled_run() {
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(1);
    let cancel = CancelToken::new();
    let sink = |_: &Record| -> anyhow::Result<()> { Ok(()) };
    let mut pipeline = Pipeline::new(PipelineConfig::with_pool_size(1), sink, LogErrorSink)
        .with_cancel_token(cancel.clone());
    pipeline.start().unwrap();
    pipeline
        .enqueue(Task::new("wedged", move || {
            let _ = gate_rx.recv();
            Ok(Fields::new())
        }))
        .unwrap();

    let monitor = Monitor::spawn(
        pipeline.observer().unwrap(),
        cancel.clone(),
        MonitorConfig {
            interval: Duration::from_millis(50),
            stall_timeout: Some(Duration::from_millis(200)),
            show_bar: false,
            total: 1,
        },
    )
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !cancel.is_cancelled() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    let outcome = monitor.stop();
    assert!(outcome.stalled);
    assert_eq!(outcome.last.enqueued, 1);
    assert_eq!(outcome.last.completed, 0);

    gate_tx.send(()).unwrap();
    let summary = pipeline.finish().unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.enqueued, 1);
}

#[test]
fn test_tasks_left_counts_tasks_not_yet_enqueued() {
    // 10,000 planned tasks: a full 1,024-slot queue does not mean the run is nearly done.
    let snapshot = Progress {
        enqueued: 1_124,
        completed: 100,
        queued: 1_024,
        pending_results: 0,
        active_workers: 4,
        collector_running: true,
    };
    assert_eq!(snapshot.remaining_of(10_000), 9_900);
    assert_eq!(snapshot.outstanding(), 1_024);
    assert_eq!(snapshot.remaining_of(50), 0);
}
