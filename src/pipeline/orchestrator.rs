use log::{debug, error, info, warn};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

use crate::{Record, Summary};

use super::collector::{CollectorContext, CollectorStats, Sink, spawn_collector};
use super::context::{PipelineConfig, Progress, ProgressObserver, TaskCounters};
use super::error_handler::ErrorSink;
use super::queue::{self, CancelToken, QueueError, QueueTx};
use super::task::Task;
use super::workers::{WorkerStats, spawn_workers};

/// Lifecycle of a [`Pipeline`]. Transitions only move forward, one step at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Created,
    Running,
    /// `close` ran: end-signals are queued, no more tasks are accepted.
    Draining,
    Terminated,
}

/// Errors surfaced to the pipeline's caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline has not been started")]
    NotStarted,
    #[error("pipeline was already started")]
    AlreadyStarted,
    #[error("job queue is closed; the pipeline is shutting down")]
    QueueClosed,
    #[error("pipeline was cancelled")]
    Cancelled,
    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),
    #[error("failed to launch pipeline thread")]
    Spawn(#[source] std::io::Error),
}

impl From<QueueError> for PipelineError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Cancelled => PipelineError::Cancelled,
            QueueError::Closed | QueueError::Empty => PipelineError::QueueClosed,
        }
    }
}

/// Threads and handles that exist only while the pipeline runs.
struct Running {
    jobs: QueueTx<Task>,
    observer: ProgressObserver,
    workers: Vec<JoinHandle<WorkerStats>>,
    collector: JoinHandle<CollectorStats>,
}

/// Producer → worker pool → single collector → sink.
///
/// ```ignore
/// let mut pipeline = Pipeline::new(PipelineConfig::with_pool_size(4), sink, LogErrorSink);
/// pipeline.start()?;
/// for task in tasks {
///     pipeline.enqueue(task)?;
/// }
/// let summary = pipeline.finish()?;
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    state: PipelineState,
    cancel: CancelToken,
    sink: Option<Box<dyn Sink>>,
    errors: Arc<dyn ErrorSink>,
    running: Option<Running>,
    enqueued: usize,
    summary: Option<Summary>,
}

impl Pipeline {
    /// Create a pipeline in the `Created` state. Nothing runs until [`start`](Self::start).
    pub fn new<S, E>(config: PipelineConfig, sink: S, errors: E) -> Self
    where
        S: Sink + 'static,
        E: ErrorSink + 'static,
    {
        let sink: Box<dyn Sink> = Box::new(sink);
        let errors: Arc<dyn ErrorSink> = Arc::new(errors);
        Self {
            config,
            state: PipelineState::Created,
            cancel: CancelToken::new(),
            sink: Some(sink),
            errors,
            running: None,
            enqueued: 0,
            summary: None,
        }
    }

    /// Share an existing cancel token (e.g. one raised by a Ctrl+C handler).
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Allocate both queues and launch the workers and the collector. Returns immediately.
    ///
    /// A thread that cannot be spawned is fatal: the cancel token is raised so any thread
    /// already started exits, and the error is returned.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.state != PipelineState::Created {
            return Err(PipelineError::AlreadyStarted);
        }
        self.config
            .validate()
            .map_err(PipelineError::InvalidConfig)?;
        let sink = self.sink.take().ok_or(PipelineError::AlreadyStarted)?;
        let pool_size = self.config.pool_size;

        let workers_alive = Arc::new(());
        let collector_alive = Arc::new(());
        let counters = Arc::new(TaskCounters::default());

        // The observer keeps a receiver of each queue alive, so producers also watch the
        // consuming threads: a push fails instead of blocking once they are all gone.
        let (job_tx, job_rx) = queue::bounded::<Task>(self.config.job_capacity, &self.cancel);
        let job_tx = job_tx.watch_consumers(&workers_alive);
        let (result_tx, result_rx) =
            queue::bounded::<Record>(self.config.result_capacity, &self.cancel);
        let result_tx = result_tx.watch_consumers(&collector_alive);

        let observer = ProgressObserver {
            jobs: job_rx.clone(),
            results: result_rx.clone(),
            workers: Arc::downgrade(&workers_alive),
            collector: Arc::downgrade(&collector_alive),
            counters: Arc::clone(&counters),
        };

        let collector = spawn_collector(CollectorContext {
            results: result_rx,
            sink,
            errors: Arc::clone(&self.errors),
            pool_size,
            alive: collector_alive,
        })
        .map_err(PipelineError::Spawn)?;

        let workers = match spawn_workers(
            pool_size,
            &job_rx,
            &result_tx,
            &self.errors,
            &counters,
            &workers_alive,
        ) {
            Ok(handles) => handles,
            Err(e) => {
                error!("Failed to spawn worker pool: {}", e);
                self.cancel.cancel();
                return Err(PipelineError::Spawn(e));
            }
        };
        // Only workers may hold result producers and liveness tokens from here on.
        drop(result_tx);
        drop(workers_alive);
        drop(job_rx);

        debug!(
            "Pipeline started: {} workers, job cap {}, result cap {}",
            pool_size, self.config.job_capacity, self.config.result_capacity
        );
        self.running = Some(Running {
            jobs: job_tx,
            observer,
            workers,
            collector,
        });
        self.state = PipelineState::Running;
        Ok(())
    }

    /// Push one task, blocking while the job queue is full. Valid only while `Running`.
    pub fn enqueue(&mut self, task: Task) -> Result<(), PipelineError> {
        match self.state {
            PipelineState::Created => return Err(PipelineError::NotStarted),
            PipelineState::Draining | PipelineState::Terminated => {
                return Err(PipelineError::QueueClosed);
            }
            PipelineState::Running => {}
        }
        let running = self.running.as_ref().ok_or(PipelineError::NotStarted)?;
        running.jobs.push(task)?;
        running.observer.counters.task_enqueued();
        self.enqueued += 1;
        Ok(())
    }

    /// Begin shutdown: push exactly one end-signal per worker, then close the job queue.
    /// A no-op once the pipeline is already draining or terminated.
    pub fn close(&mut self) -> Result<(), PipelineError> {
        match self.state {
            PipelineState::Created => return Err(PipelineError::NotStarted),
            PipelineState::Draining | PipelineState::Terminated => return Ok(()),
            PipelineState::Running => {}
        }
        let running = self.running.as_mut().ok_or(PipelineError::NotStarted)?;
        for sent in 0..self.config.pool_size {
            if let Err(e) = running.jobs.push_end() {
                warn!(
                    "Stopped queuing end-signals after {} of {}: {}",
                    sent, self.config.pool_size, e
                );
                break;
            }
        }
        running.jobs.close();
        self.state = PipelineState::Draining;
        debug!("Pipeline draining: {} tasks enqueued", self.enqueued);
        Ok(())
    }

    /// Block until every worker and the collector have exited, then return the summary.
    /// Calls [`close`](Self::close) first if it has not run yet. Idempotent.
    pub fn wait(&mut self) -> Result<Summary, PipelineError> {
        if let Some(summary) = &self.summary {
            return Ok(summary.clone());
        }
        self.close()?;
        let running = self.running.take().ok_or(PipelineError::NotStarted)?;

        let mut summary = Summary {
            enqueued: self.enqueued,
            ..Summary::default()
        };
        for handle in running.workers {
            match handle.join() {
                Ok(stats) => {
                    summary.succeeded += stats.succeeded;
                    summary.task_failures += stats.failed;
                    summary.cancelled |= stats.cancelled;
                }
                Err(_) => {
                    error!("worker thread panicked");
                    summary.panicked_threads += 1;
                }
            }
        }
        match running.collector.join() {
            Ok(stats) => {
                summary.persisted = stats.persisted;
                summary.sink_failures = stats.sink_failures;
                summary.end_signals = stats.end_signals;
                summary.cancelled |= stats.cancelled;
            }
            Err(_) => {
                error!("collector thread panicked");
                summary.panicked_threads += 1;
            }
        }
        summary.cancelled |= self.cancel.is_cancelled();

        info!(
            "Pipeline finished: {} enqueued, {} persisted, {} task failures, {} sink failures",
            summary.enqueued, summary.persisted, summary.task_failures, summary.sink_failures
        );
        self.state = PipelineState::Terminated;
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    /// [`close`](Self::close) then [`wait`](Self::wait). Calling it again returns the same summary.
    pub fn finish(&mut self) -> Result<Summary, PipelineError> {
        self.close()?;
        self.wait()
    }

    /// Raise the cancel token. Blocked queue operations return within one poll interval.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current queue depths and liveness. All zeros before `start`.
    pub fn progress(&self) -> Progress {
        self.running
            .as_ref()
            .map(|r| r.observer.snapshot())
            .unwrap_or_default()
    }

    /// A handle a monitoring thread can poll. None before `start` and after termination.
    pub fn observer(&self) -> Option<ProgressObserver> {
        self.running.as_ref().map(|r| r.observer.clone())
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.running.is_some() {
            debug!("Pipeline dropped before termination; cancelling");
            self.cancel.cancel();
        }
    }
}
