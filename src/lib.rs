//! Exifold: fan independent work items out to a bounded worker pool and fold their
//! key/value results through a single collector into a store.

pub mod engine;
pub mod index;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use pipeline::{
    CancelToken, ErrorSink, Failure, FailureKind, LogErrorSink, Pipeline, PipelineConfig,
    PipelineError, PipelineState, Progress, Sink, Task,
};

use log::debug;

/// Result alias used by public exifold API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point for a batch: start a pipeline, enqueue every task, finish, return the summary.
///
/// Use [`Pipeline`] directly to enqueue incrementally, observe progress, or share a cancel token.
///
/// ```ignore
/// let tasks = ids.into_iter().map(|id| Task::new(id.clone(), move || fetch_and_parse(&id)));
/// let summary = exifold::run_tasks(PipelineConfig::with_pool_size(4), tasks, sink, LogErrorSink)?;
/// ```
pub fn run_tasks<I, S, E>(
    config: PipelineConfig,
    tasks: I,
    sink: S,
    errors: E,
) -> std::result::Result<Summary, PipelineError>
where
    I: IntoIterator<Item = Task>,
    S: Sink + 'static,
    E: ErrorSink + 'static,
{
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        config
    );
    let mut pipeline = Pipeline::new(config, sink, errors);
    pipeline.start()?;
    for task in tasks {
        pipeline.enqueue(task)?;
    }
    pipeline.finish()
}
