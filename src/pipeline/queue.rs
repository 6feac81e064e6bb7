//! Bounded hand-off queue between the crawler and the download workers.
//!
//! A single producer pushes, any number of workers take. Every item is
//! delivered to exactly one taker. The queue never closes on its own; callers
//! stop it through a [`CancellationToken`].

use std::time::Duration;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio_util::sync::CancellationToken;

/// Result of offering an item to the queue
///
/// Every variant except `Queued` hands the item back to the caller.
#[derive(Debug, PartialEq, Eq)]
pub enum PutOutcome<T> {
    /// The item is in the queue
    Queued,
    /// The queue had no free slot
    Full(T),
    /// No slot opened up within the enqueue timeout
    TimedOut(T),
    /// Cancellation fired before a slot opened up
    Cancelled(T),
}

/// FIFO queue with a fixed number of slots
#[derive(Debug)]
pub struct BoundedQueue<T> {
    tx: mpsc::Sender<T>,
    rx: Mutex<mpsc::Receiver<T>>,
    /// Woken whenever a take leaves the queue empty
    emptied: Notify,
}

impl<T> BoundedQueue<T> {
    /// Create a queue with room for `capacity` items
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            emptied: Notify::new(),
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Items currently waiting
    ///
    /// Only a snapshot: producers and takers may change it right after.
    pub fn approximate_size(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Whether nothing is waiting right now
    pub fn is_empty(&self) -> bool {
        self.approximate_size() == 0
    }

    /// Enqueue without waiting
    pub fn try_put(&self, item: T) -> PutOutcome<T> {
        match self.tx.try_send(item) {
            Ok(()) => PutOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(item)) => PutOutcome::Full(item),
            // The receiver lives as long as the queue itself
            Err(mpsc::error::TrySendError::Closed(item)) => PutOutcome::Cancelled(item),
        }
    }

    /// Enqueue, waiting for a free slot
    ///
    /// Waits at most `timeout` when one is given. Cancellation wins over a
    /// slot that opens up at the same moment.
    pub async fn put(
        &self,
        item: T,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> PutOutcome<T> {
        if cancel.is_cancelled() {
            return PutOutcome::Cancelled(item);
        }

        let reserve = async {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, self.tx.reserve()).await.ok(),
                None => Some(self.tx.reserve().await),
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => PutOutcome::Cancelled(item),
            permit = reserve => match permit {
                Some(Ok(permit)) => {
                    permit.send(item);
                    PutOutcome::Queued
                }
                Some(Err(_)) => PutOutcome::Cancelled(item),
                None => PutOutcome::TimedOut(item),
            },
        }
    }

    /// Dequeue the next item, waiting until one arrives
    ///
    /// Returns `None` once `cancel` fires. After that no further item is
    /// handed out, even if some are still waiting.
    pub async fn take(&self, cancel: &CancellationToken) -> Option<T> {
        let mut rx = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            rx = self.rx.lock() => rx,
        };

        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            item = rx.recv() => item,
        };
        drop(rx);

        if item.is_some() && self.is_empty() {
            self.emptied.notify_waiters();
        }
        item
    }

    /// Wait until the queue holds no items
    ///
    /// Returns at once if it is already empty.
    pub async fn wait_until_empty(&self) {
        loop {
            let notified = self.emptied.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }
}
