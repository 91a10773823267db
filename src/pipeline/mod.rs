//! Pipeline components: queues, worker pool, result collector, orchestrator.
//!
//! Caller → job queue → N workers → result queue → 1 collector → sink. Shutdown is
//! in-band: one end-signal per worker on the job queue, one per worker forwarded to
//! the result queue, and the collector stops once it has counted them all.

pub mod collector;
pub mod context;
pub mod error_handler;
pub mod orchestrator;
pub mod queue;
pub mod task;
pub mod workers;

pub use collector::{CollectorStats, Sink};
pub use context::{PipelineConfig, Progress, ProgressObserver};
pub use error_handler::{ErrorSink, Failure, FailureKind, LogErrorSink};
pub use orchestrator::{Pipeline, PipelineError, PipelineState};
pub use queue::{CancelToken, Message, QueueError, QueueRx, QueueTx, bounded};
pub use task::Task;
pub use workers::WorkerStats;
