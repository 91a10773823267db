//! Queue tests: backpressure, close/drain semantics, cancellation, single delivery.

use crossbeam_channel::bounded as signal;
use exifold::pipeline::{CancelToken, Message, QueueError, bounded};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_push_pop_fifo_single_producer() {
    let cancel = CancelToken::new();
    let (tx, rx) = bounded::<u32>(4, &cancel);
    tx.push(1).unwrap();
    tx.push(2).unwrap();
    tx.push_end().unwrap();
    assert_eq!(rx.pop(), Ok(Message::Item(1)));
    assert_eq!(rx.pop(), Ok(Message::Item(2)));
    assert_eq!(rx.pop(), Ok(Message::End));
}

#[test]
fn test_push_blocks_when_full_until_pop() {
    let cancel = CancelToken::new();
    let (tx, rx) = bounded::<u32>(2, &cancel);
    tx.push(1).unwrap();
    tx.push(2).unwrap();
    assert_eq!(rx.len(), 2);

    let (done_tx, done_rx) = signal::<()>(1);
    let producer = thread::spawn(move || {
        tx.push(3).unwrap();
        done_tx.send(()).unwrap();
    });

    // Third push must still be blocked: no consumer has popped.
    assert!(done_rx.recv_timeout(Duration::from_millis(200)).is_err());
    assert_eq!(rx.len(), 2);

    assert_eq!(rx.pop(), Ok(Message::Item(1)));
    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("push should unblock after a pop");
    producer.join().unwrap();
    assert_eq!(rx.pop(), Ok(Message::Item(2)));
    assert_eq!(rx.pop(), Ok(Message::Item(3)));
}

#[test]
fn test_push_on_closed_handle_fails() {
    let cancel = CancelToken::new();
    let (mut tx, _rx) = bounded::<u32>(2, &cancel);
    tx.close();
    assert!(tx.is_closed());
    assert_eq!(tx.push(1), Err(QueueError::Closed));
    assert_eq!(tx.push_end(), Err(QueueError::Closed));
}

#[test]
fn test_push_fails_when_all_consumers_gone() {
    let cancel = CancelToken::new();
    let (tx, rx) = bounded::<u32>(2, &cancel);
    drop(rx);
    assert_eq!(tx.push(1), Err(QueueError::Closed));
}

#[test]
fn test_pop_drains_then_reports_empty_after_close() {
    let cancel = CancelToken::new();
    let (mut tx, rx) = bounded::<u32>(4, &cancel);
    tx.push(7).unwrap();
    tx.close();
    assert_eq!(rx.pop(), Ok(Message::Item(7)));
    assert_eq!(rx.pop(), Err(QueueError::Empty));
}

#[test]
fn test_channel_stays_open_while_any_producer_clone_lives() {
    let cancel = CancelToken::new();
    let (mut tx, rx) = bounded::<u32>(4, &cancel);
    let tx2 = tx.clone();
    tx.close();
    tx2.push(5).unwrap();
    assert_eq!(rx.pop(), Ok(Message::Item(5)));
    drop(tx2);
    assert_eq!(rx.pop(), Err(QueueError::Empty));
}

#[test]
fn test_cancel_unblocks_pop() {
    let cancel = CancelToken::new();
    let (_tx, rx) = bounded::<u32>(1, &cancel);
    let consumer = thread::spawn(move || rx.pop());
    thread::sleep(Duration::from_millis(100));
    let raised = Instant::now();
    cancel.cancel();
    assert_eq!(consumer.join().unwrap(), Err(QueueError::Cancelled));
    assert!(raised.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_cancel_unblocks_full_push() {
    let cancel = CancelToken::new();
    let (tx, _rx) = bounded::<u32>(1, &cancel);
    tx.push(1).unwrap();
    let producer = thread::spawn(move || tx.push(2));
    thread::sleep(Duration::from_millis(100));
    cancel.cancel();
    assert_eq!(producer.join().unwrap(), Err(QueueError::Cancelled));
}

#[test]
fn test_try_pop_ignores_cancel_and_drains_buffer() {
    let cancel = CancelToken::new();
    let (tx, rx) = bounded::<u32>(4, &cancel);
    tx.push(1).unwrap();
    tx.push(2).unwrap();
    cancel.cancel();
    assert_eq!(rx.pop(), Err(QueueError::Cancelled));
    assert_eq!(rx.try_pop(), Some(Message::Item(1)));
    assert_eq!(rx.try_pop(), Some(Message::Item(2)));
    assert_eq!(rx.try_pop(), None);
}

#[test]
fn test_zero_capacity_is_raised_to_one() {
    let cancel = CancelToken::new();
    let (tx, rx) = bounded::<u32>(0, &cancel);
    assert_eq!(rx.capacity(), Some(1));
    tx.push(1).unwrap();
    assert_eq!(rx.pop(), Ok(Message::Item(1)));
}

#[test]
fn test_each_value_delivered_to_exactly_one_consumer() {
    const N: u32 = 2_000;
    const CONSUMERS: usize = 4;
    let cancel = CancelToken::new();
    let (mut tx, rx) = bounded::<u32>(16, &cancel);

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let rx = rx.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Ok(msg) = rx.pop() {
                    match msg {
                        Message::Item(v) => seen.push(v),
                        Message::End => break,
                    }
                }
                seen
            })
        })
        .collect();
    drop(rx);

    for v in 0..N {
        tx.push(v).unwrap();
    }
    for _ in 0..CONSUMERS {
        tx.push_end().unwrap();
    }
    tx.close();

    let mut all = Vec::new();
    for c in consumers {
        all.extend(c.join().unwrap());
    }
    assert_eq!(all.len(), N as usize);
    let unique: HashSet<u32> = all.into_iter().collect();
    assert_eq!(unique.len(), N as usize);
}

#[test]
fn test_push_fails_once_watched_consumers_are_gone() {
    let cancel = CancelToken::new();
    let consumers_alive = Arc::new(());
    let (tx, rx) = bounded::<u32>(1, &cancel);
    let tx = tx.watch_consumers(&consumers_alive);
    // A receiver that only observes depth keeps the channel connected.
    let _observer = rx.clone();

    tx.push(1).unwrap();
    let producer = thread::spawn(move || tx.push(2));
    thread::sleep(Duration::from_millis(100));
    drop(consumers_alive);
    assert_eq!(producer.join().unwrap(), Err(QueueError::Closed));
    assert_eq!(rx.len(), 1);
}

#[test]
fn test_watched_push_succeeds_while_a_consumer_lives() {
    let cancel = CancelToken::new();
    let consumers_alive = Arc::new(());
    let (tx, rx) = bounded::<u32>(2, &cancel);
    let tx = tx.watch_consumers(&consumers_alive);
    let consumer_token = Arc::clone(&consumers_alive);
    drop(consumers_alive);

    tx.push(1).unwrap();
    assert_eq!(rx.pop(), Ok(Message::Item(1)));
    drop(consumer_token);
    assert_eq!(tx.push(2), Err(QueueError::Closed));
}
