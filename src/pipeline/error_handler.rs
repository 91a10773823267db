//! Failure records and the error-sink capability.

use serde::Serialize;
use std::any::Any;
use std::fmt;
use thiserror::Error;

/// Which stage a [`Failure`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    /// The task's capability returned an error (or panicked). No record was produced.
    Task,
    /// The sink rejected a record. The record is lost but counted.
    Sink,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Task => f.write_str("task"),
            FailureKind::Sink => f.write_str("sink"),
        }
    }
}

/// One recovered failure, reported to the [`ErrorSink`] and counted in the summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Error)]
#[error("{kind} failure for {source_id}: {message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub source_id: String,
    pub message: String,
}

impl Failure {
    pub fn task(source_id: impl Into<String>, err: &anyhow::Error) -> Self {
        Self {
            kind: FailureKind::Task,
            source_id: source_id.into(),
            message: format!("{:#}", err),
        }
    }

    pub fn sink(source_id: impl Into<String>, err: &anyhow::Error) -> Self {
        Self {
            kind: FailureKind::Sink,
            source_id: source_id.into(),
            message: format!("{:#}", err),
        }
    }
}

/// Text of a caught panic payload, for the failure message.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Fire-and-forget failure reporting. Called from worker threads and the collector thread.
pub trait ErrorSink: Send + Sync {
    fn report(&self, failure: &Failure);
}

impl<F> ErrorSink for F
where
    F: Fn(&Failure) + Send + Sync,
{
    fn report(&self, failure: &Failure) {
        self(failure)
    }
}

/// Default error-sink: one warning per failure.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, failure: &Failure) {
        log::warn!("{}", failure);
    }
}
