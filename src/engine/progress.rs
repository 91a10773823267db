//! Progress monitor: periodic "tasks left" reporting and the stall watchdog.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use kdam::{Animation, Bar, BarExt};
use log::{info, warn};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::pipeline::{CancelToken, Progress, ProgressObserver};

/// How the monitor reports and when it gives up on a stuck pipeline.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub interval: Duration,
    /// Cancel the run when the snapshot has not changed for this long. None: never.
    pub stall_timeout: Option<Duration>,
    /// Draw a progress bar over `total` tasks instead of logging "tasks left".
    pub show_bar: bool,
    /// Tasks the producer will enqueue in all; "tasks left" is this minus completed ones.
    pub total: usize,
}

/// How the monitor ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MonitorOutcome {
    /// The watchdog raised the cancel token.
    pub stalled: bool,
    pub last: Progress,
}

/// Running monitor thread. Call [`stop`](Self::stop) once the pipeline has finished.
pub struct Monitor {
    stop_tx: Sender<()>,
    handle: JoinHandle<MonitorOutcome>,
}

impl Monitor {
    pub fn spawn(
        observer: ProgressObserver,
        cancel: CancelToken,
        config: MonitorConfig,
    ) -> io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name(format!("{}-monitor", env!("CARGO_PKG_NAME")))
            .spawn(move || monitor_loop(observer, cancel, config, stop_rx))?;
        Ok(Self { stop_tx, handle })
    }

    pub fn stop(self) -> MonitorOutcome {
        let _ = self.stop_tx.try_send(());
        self.handle.join().unwrap_or_default()
    }
}

/// Tracks when the observed snapshot last changed.
#[derive(Debug)]
pub struct StallWatch {
    last: Option<Progress>,
    changed_at: Instant,
    timeout: Option<Duration>,
}

impl StallWatch {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            last: None,
            changed_at: Instant::now(),
            timeout,
        }
    }

    /// Record a snapshot taken at `now`; true when nothing has changed for longer than the timeout.
    pub fn observe(&mut self, snapshot: Progress, now: Instant) -> bool {
        if self.last != Some(snapshot) {
            self.last = Some(snapshot);
            self.changed_at = now;
            return false;
        }
        self.timeout
            .is_some_and(|t| now.saturating_duration_since(self.changed_at) >= t)
    }
}

fn create_bar(total: usize) -> Bar {
    kdam::tqdm!(
        total = total,
        desc = "Folding",
        animation = Animation::Classic,
        unit = " tasks"
    )
}

fn monitor_loop(
    observer: ProgressObserver,
    cancel: CancelToken,
    config: MonitorConfig,
    stop_rx: Receiver<()>,
) -> MonitorOutcome {
    let mut bar = config.show_bar.then(|| create_bar(config.total));
    let mut watch = StallWatch::new(config.stall_timeout);
    let mut outcome = MonitorOutcome::default();

    loop {
        match stop_rx.recv_timeout(config.interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        let snapshot = observer.snapshot();
        outcome.last = snapshot;
        if snapshot.is_finished() {
            break;
        }
        match bar.as_mut() {
            Some(bar) => {
                let _ = bar.update_to(snapshot.completed.min(config.total));
            }
            None => info!(
                "Tasks left: {} ({} queued, {} results pending, {} workers active)",
                snapshot.remaining_of(config.total),
                snapshot.queued,
                snapshot.pending_results,
                snapshot.active_workers
            ),
        }
        if watch.observe(snapshot, Instant::now()) {
            warn!(
                "No progress for {:?}; cancelling the run",
                config.stall_timeout.unwrap_or_default()
            );
            cancel.cancel();
            outcome.stalled = true;
            break;
        }
    }

    if let Some(bar) = bar.as_mut() {
        if !outcome.stalled {
            let _ = bar.update_to(config.total);
        }
        let _ = bar.refresh();
        eprintln!();
    }
    outcome
}
