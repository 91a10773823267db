//! Bounded job/result queues with an end-signal and cooperative cancellation.
//!
//! Both queues are crossbeam bounded channels carrying [`Message`]s. A value popped by one
//! consumer is never seen by another. Blocking calls wake every
//! [`QueueConsts::CANCEL_POLL_INTERVAL`] to check the shared [`CancelToken`].

use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, bounded as channel,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;

use crate::utils::config::QueueConsts;

/// What travels through a queue: a real value, or the payload-free end-signal.
#[derive(Debug, PartialEq, Eq)]
pub enum Message<T> {
    Item(T),
    End,
}

/// Structural queue errors. Never retried by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Push on a closed handle, or every consumer is gone (dropped or, when watched, dead).
    #[error("queue is closed")]
    Closed,
    /// Pop on a queue that is closed and fully drained.
    #[error("queue is closed and drained")]
    Empty,
    /// The cancel token was raised while waiting.
    #[error("operation cancelled")]
    Cancelled,
}

/// Process-wide cancellation flag shared by every queue of a pipeline.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Producer handle. Cloned once per producer; the channel closes when every handle is closed or dropped.
pub struct QueueTx<T> {
    tx: Option<Sender<Message<T>>>,
    cancel: CancelToken,
    /// Liveness of the consuming threads. Once it is gone, pushes fail with `Closed` even if a
    /// non-consuming receiver (a progress observer) keeps the channel connected.
    consumers: Option<Weak<()>>,
}

/// Consumer handle. Clones share the same queue (multi-consumer, single delivery).
pub struct QueueRx<T> {
    rx: Receiver<Message<T>>,
    cancel: CancelToken,
}

/// Create a bounded queue. A capacity of 0 is raised to 1 so the queue always buffers.
pub fn bounded<T>(capacity: usize, cancel: &CancelToken) -> (QueueTx<T>, QueueRx<T>) {
    let (tx, rx) = channel(capacity.max(1));
    (
        QueueTx {
            tx: Some(tx),
            cancel: cancel.clone(),
            consumers: None,
        },
        QueueRx {
            rx,
            cancel: cancel.clone(),
        },
    )
}

impl<T> Clone for QueueTx<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
            consumers: self.consumers.clone(),
        }
    }
}

impl<T> Clone for QueueRx<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> QueueTx<T> {
    /// Tie this handle to the consumers' liveness token: pushes fail with
    /// [`QueueError::Closed`] once every strong reference to it is dropped.
    pub fn watch_consumers(mut self, alive: &Arc<()>) -> Self {
        self.consumers = Some(Arc::downgrade(alive));
        self
    }

    fn consumers_gone(&self) -> bool {
        self.consumers
            .as_ref()
            .is_some_and(|alive| alive.strong_count() == 0)
    }

    /// Push a value, blocking while the queue is full.
    pub fn push(&self, value: T) -> Result<(), QueueError> {
        self.send(Message::Item(value))
    }

    /// Push one end-signal, blocking while the queue is full.
    pub fn push_end(&self) -> Result<(), QueueError> {
        self.send(Message::End)
    }

    fn send(&self, msg: Message<T>) -> Result<(), QueueError> {
        let tx = self.tx.as_ref().ok_or(QueueError::Closed)?;
        let mut msg = msg;
        loop {
            if self.cancel.is_cancelled() {
                return Err(QueueError::Cancelled);
            }
            if self.consumers_gone() {
                return Err(QueueError::Closed);
            }
            match tx.send_timeout(msg, QueueConsts::CANCEL_POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(m)) => msg = m,
                Err(SendTimeoutError::Disconnected(_)) => return Err(QueueError::Closed),
            }
        }
    }

    /// Close this handle. Later pushes through it fail with [`QueueError::Closed`].
    pub fn close(&mut self) {
        self.tx = None;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    /// Current depth (advisory). 0 once this handle is closed.
    pub fn len(&self) -> usize {
        self.tx.as_ref().map_or(0, Sender::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> QueueRx<T> {
    /// Pop the next message, blocking until one is available.
    ///
    /// Returns [`QueueError::Empty`] once every producer is gone and the queue is drained,
    /// [`QueueError::Cancelled`] as soon as the token is raised.
    pub fn pop(&self) -> Result<Message<T>, QueueError> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(QueueError::Cancelled);
            }
            match self.rx.recv_timeout(QueueConsts::CANCEL_POLL_INTERVAL) {
                Ok(msg) => return Ok(msg),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(QueueError::Empty),
            }
        }
    }

    /// Take a message only if one is buffered right now. Ignores the cancel token.
    pub fn try_pop(&self) -> Option<Message<T>> {
        match self.rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Current depth (advisory, not a snapshot under lock).
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.rx.capacity()
    }
}
