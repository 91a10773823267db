use log::{debug, warn};
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::Record;

use super::context::TaskCounters;
use super::error_handler::{ErrorSink, Failure, panic_message};
use super::queue::{Message, QueueError, QueueRx, QueueTx};
use super::task::Task;

/// What one worker did before it terminated. Returned through its `JoinHandle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub succeeded: usize,
    pub failed: usize,
    /// True when the worker stopped on an end-signal (the normal path).
    pub saw_end: bool,
    pub cancelled: bool,
}

/// Everything a worker thread owns.
pub(crate) struct WorkerContext {
    pub jobs: QueueRx<Task>,
    pub results: QueueTx<Record>,
    pub errors: Arc<dyn ErrorSink>,
    pub counters: Arc<TaskCounters>,
    /// Held for the lifetime of the thread so observers can count live workers.
    pub alive: Arc<()>,
}

/// Run a task's capability, turning a panic into an ordinary error.
fn run_task(task: Task) -> (String, anyhow::Result<Record>) {
    let Task { id, job } = task;
    let outcome = match catch_unwind(AssertUnwindSafe(job)) {
        Ok(res) => res,
        Err(payload) => Err(anyhow::anyhow!(
            "task panicked: {}",
            panic_message(payload.as_ref())
        )),
    };
    let record = outcome.map(|fields| Record {
        source_id: id.clone(),
        fields,
    });
    (id, record)
}

/// Single worker: pop tasks until an end-signal, forward records, report failures.
/// Always propagates exactly one end-signal into the result queue before returning.
fn worker_loop(worker_id: usize, ctx: WorkerContext) -> WorkerStats {
    let WorkerContext {
        jobs,
        mut results,
        errors,
        counters,
        alive,
    } = ctx;
    let mut stats = WorkerStats::default();

    loop {
        let task = match jobs.pop() {
            Ok(Message::Item(task)) => task,
            Ok(Message::End) => {
                stats.saw_end = true;
                break;
            }
            Err(QueueError::Empty) => {
                warn!(
                    "worker {}: job queue closed without an end-signal",
                    worker_id
                );
                break;
            }
            Err(_) => {
                stats.cancelled = true;
                break;
            }
        };

        let outcome = run_task(task);
        counters.task_completed();
        match outcome {
            (_, Ok(record)) => {
                stats.succeeded += 1;
                match results.push(record) {
                    Ok(()) => {}
                    Err(QueueError::Cancelled) => {
                        stats.cancelled = true;
                        break;
                    }
                    Err(e) => {
                        warn!("worker {}: result queue unavailable: {}", worker_id, e);
                        break;
                    }
                }
            }
            (id, Err(err)) => {
                stats.failed += 1;
                errors.report(&Failure::task(id, &err));
            }
        }
    }

    if let Err(e) = results.push_end() {
        debug!("worker {}: end-signal not delivered: {}", worker_id, e);
    }
    results.close();
    drop(alive);
    debug!(
        "worker {} done: {} ok, {} failed",
        worker_id, stats.succeeded, stats.failed
    );
    stats
}

/// Spawn `pool_size` workers. Each gets its own handles to both queues.
/// On a spawn error the already started workers are left to the caller's cancel token.
pub(crate) fn spawn_workers(
    pool_size: usize,
    jobs: &QueueRx<Task>,
    results: &QueueTx<Record>,
    errors: &Arc<dyn ErrorSink>,
    counters: &Arc<TaskCounters>,
    alive: &Arc<()>,
) -> io::Result<Vec<JoinHandle<WorkerStats>>> {
    let pkg = env!("CARGO_PKG_NAME");
    (0..pool_size)
        .map(|worker_id| {
            let ctx = WorkerContext {
                jobs: jobs.clone(),
                results: results.clone(),
                errors: Arc::clone(errors),
                counters: Arc::clone(counters),
                alive: Arc::clone(alive),
            };
            thread::Builder::new()
                .name(format!("{pkg}-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, ctx))
        })
        .collect()
}
