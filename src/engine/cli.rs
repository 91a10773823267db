//! CLI command handler: merge config file and flags, run, print the summary.

use anyhow::{Context, Result};
use colored::Colorize;
use log::debug;

use crate::engine::arg_parser::Cli;
use crate::index::index_dir;
use crate::pipeline::CancelToken;
use crate::utils::{Colors, apply_file_to_opts, load_exifold_toml, setup_logging};
use crate::{Opts, Summary};

/// Overwrite an opts field when the flag was given.
macro_rules! apply_cli_opt {
    ($cli:expr, $opts:expr, $cli_field:ident => $opts_field:ident) => {
        if let Some(v) = $cli.$cli_field {
            $opts.$opts_field = v;
        }
    };
}

/// Build opts: defaults, then `.exifold.toml` in DIR, then CLI flags.
pub fn setup_opts(cli: &Cli) -> Opts {
    let mut opts = Opts::default();
    if let Some(file) = load_exifold_toml(&cli.dir) {
        apply_file_to_opts(&file, &mut opts);
    }
    if cli.db.is_some() {
        opts.db_path = cli.db.clone();
    }
    opts.num_workers = cli.workers.or(opts.num_workers);
    opts.queue_capacity = cli.queue_capacity.or(opts.queue_capacity);
    opts.max_attempts = cli.retries.or(opts.max_attempts);
    opts.stall_timeout_secs = cli.stall_timeout.or(opts.stall_timeout_secs);
    opts.progress_interval_secs = cli.progress_interval.or(opts.progress_interval_secs);
    apply_cli_opt!(cli, opts, check_hash => with_hash);
    apply_cli_opt!(cli, opts, follow_links => follow_links);
    if !cli.exclude.is_empty() {
        opts.exclude.extend(cli.exclude.iter().cloned());
    }
    apply_cli_opt!(cli, opts, strict => strict);
    apply_cli_opt!(cli, opts, json => json);
    apply_cli_opt!(cli, opts, verbose => verbose);
    opts
}

/// Entry point for `main`: set up logging and Ctrl+C, process DIR, report.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let mut opts = setup_opts(cli);
    setup_logging(opts.verbose);
    if opts.db_path.is_none() {
        opts.db_path = Some(cli.db_path());
    }
    let cancel = CancelToken::new();
    let cancel_handler = cancel.clone();
    ctrlc::set_handler(move || cancel_handler.cancel()).context("set Ctrl+C handler")?;
    debug!("Folding directory {}...", cli.dir.display());

    let summary = index_dir(&cli.dir, &opts, &cancel)?;
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    if summary.cancelled {
        anyhow::bail!("Run cancelled; {} records were stored", summary.persisted);
    }
    Ok(())
}

fn count_line(label: &str, n: usize, bad: bool) -> String {
    let color = if bad && n > 0 {
        Colors::FAILED
    } else {
        Colors::OK
    };
    Colors::colorize(color, &format!("{}: {}", label, n))
}

/// Print the run summary: tasks in, records out, failures of each kind.
pub fn print_summary(summary: &Summary) {
    println!(
        "{} | {} | {} | {}",
        count_line("Enqueued", summary.enqueued, false),
        count_line("Stored", summary.persisted, false),
        count_line("Task failures", summary.task_failures, true),
        count_line("Store failures", summary.sink_failures, true),
    );
    let unexecuted = summary.unexecuted();
    if unexecuted > 0 {
        println!(
            "{}",
            Colors::colorize(Colors::NOTE, &format!("Not executed: {}", unexecuted))
        );
    }
    if summary.panicked_threads > 0 {
        println!(
            "{}",
            format!("Threads lost: {}", summary.panicked_threads).red()
        );
    }
}
