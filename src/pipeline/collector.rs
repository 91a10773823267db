//! Result collector: the single consumer of the result queue and sole owner of the sink.

use log::{debug, info, warn};
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::Record;

use super::error_handler::{ErrorSink, Failure, panic_message};
use super::queue::{Message, QueueError, QueueRx};

/// Persistence capability. Only ever called from the collector thread, so implementations
/// need no internal locking.
pub trait Sink: Send {
    /// Persist one record. An error (or a panic) loses this record only; draining continues.
    fn store(&mut self, record: &Record) -> anyhow::Result<()>;

    /// Called once after the last record, before the collector exits.
    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<F> Sink for F
where
    F: FnMut(&Record) -> anyhow::Result<()> + Send,
{
    fn store(&mut self, record: &Record) -> anyhow::Result<()> {
        self(record)
    }
}

/// What the collector did before it terminated. Returned through its `JoinHandle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectorStats {
    pub persisted: usize,
    pub sink_failures: usize,
    pub end_signals: usize,
    pub cancelled: bool,
}

/// Everything the collector thread owns.
pub(crate) struct CollectorContext {
    pub results: QueueRx<Record>,
    pub sink: Box<dyn Sink>,
    pub errors: Arc<dyn ErrorSink>,
    pub pool_size: usize,
    pub alive: Arc<()>,
}

struct Collector {
    sink: Box<dyn Sink>,
    errors: Arc<dyn ErrorSink>,
    stats: CollectorStats,
}

impl Collector {
    fn persist(&mut self, record: Record) {
        let stored = catch_unwind(AssertUnwindSafe(|| self.sink.store(&record)))
            .unwrap_or_else(|payload| {
                Err(anyhow::anyhow!(
                    "sink panicked: {}",
                    panic_message(payload.as_ref())
                ))
            });
        match stored {
            Ok(()) => self.stats.persisted += 1,
            Err(err) => {
                self.stats.sink_failures += 1;
                self.errors.report(&Failure::sink(record.source_id, &err));
            }
        }
    }

    fn handle(&mut self, msg: Message<Record>) {
        match msg {
            Message::Item(record) => self.persist(record),
            Message::End => self.stats.end_signals += 1,
        }
    }
}

/// Drain the result queue into the sink until every worker has sent its end-signal.
/// Whatever is still buffered when the loop stops (end-signals complete, queue closed or
/// cancelled) is persisted before returning.
fn collector_loop(ctx: CollectorContext) -> CollectorStats {
    let CollectorContext {
        results,
        sink,
        errors,
        pool_size,
        alive,
    } = ctx;
    let mut collector = Collector {
        sink,
        errors,
        stats: CollectorStats::default(),
    };

    while collector.stats.end_signals < pool_size {
        match results.pop() {
            Ok(msg) => collector.handle(msg),
            Err(QueueError::Cancelled) => {
                info!("Collection cancelled; flushing buffered results...");
                collector.stats.cancelled = true;
                break;
            }
            Err(_) => {
                debug!(
                    "collector: result queue closed after {} of {} end-signals",
                    collector.stats.end_signals, pool_size
                );
                break;
            }
        }
    }

    while let Some(msg) = results.try_pop() {
        collector.handle(msg);
    }

    if let Err(e) = collector.sink.flush() {
        warn!("collector: sink flush failed: {:#}", e);
    }
    drop(alive);

    let stats = collector.stats;
    debug!(
        "collector done: {} persisted, {} sink failures, {} end-signals",
        stats.persisted, stats.sink_failures, stats.end_signals
    );
    stats
}

pub(crate) fn spawn_collector(ctx: CollectorContext) -> io::Result<JoinHandle<CollectorStats>> {
    thread::Builder::new()
        .name(format!("{}-collector", env!("CARGO_PKG_NAME")))
        .spawn(move || collector_loop(ctx))
}
