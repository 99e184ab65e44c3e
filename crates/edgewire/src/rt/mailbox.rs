// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mailbox: MPSC queue + counting semaphore.
//!
//! Producers enqueue from any thread; the owning worker thread consumes with
//! blocking or timed waits. Signalling is idempotent: the semaphore is only
//! posted when its value is at or below zero, and the consumer drains
//! surplus posts by retrying the pop.

use crate::error::{SyscallError, WaitError};
use crate::messages::MessagePtr;
use crate::rt::queue::MpscQueue;
use crate::rt::sem::Semaphore;
use std::time::Duration;

/// Generic blocking MPSC queue (queue + semaphore pairing).
///
/// Consumption follows the single-consumer contract of [`MpscQueue`].
pub struct WaitQueue<T> {
    queue: MpscQueue<T>,
    sem: Semaphore,
}

impl<T> WaitQueue<T> {
    pub fn new() -> Result<Self, SyscallError> {
        Ok(Self {
            queue: MpscQueue::new(),
            sem: Semaphore::new()?,
        })
    }

    /// Enqueue an item and wake the consumer if it may be sleeping.
    pub fn enqueue(&self, item: T) {
        self.queue.push(item);
        // Post only when the consumer may be out of credit; extra posts are
        // drained by the retry loop on the consumer side.
        let value = self.sem.value().unwrap_or(0);
        if value <= 0 {
            if let Err(err) = self.sem.post() {
                log::warn!("[mbox] wake post failed: {}", err);
            }
        }
    }

    /// Dequeue one item, blocking until one arrives.
    pub fn dequeue(&self) -> T {
        loop {
            if let Some(item) = self.queue.pop() {
                return item;
            }
            if let Err(err) = self.sem.wait() {
                log::warn!("[mbox] wait failed: {}", err);
            }
        }
    }

    /// Dequeue one item, waiting at most `timeout`.
    ///
    /// # Returns
    /// `None` when the timeout expires with the queue still empty.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<T> {
        loop {
            if let Some(item) = self.queue.pop() {
                return Some(item);
            }
            match self.sem.wait_timeout(timeout) {
                Ok(()) => {}
                Err(WaitError::Timeout) => return None,
                Err(WaitError::Sys(err)) => {
                    log::warn!("[mbox] timed wait failed: {}", err);
                    return None;
                }
            }
        }
    }
}

/// A worker thread's inbox of protocol messages.
///
/// Shared as `Arc<Mailbox>`: any thread may [`enqueue`](Self::enqueue), but
/// only the owning worker thread may dequeue.
pub struct Mailbox {
    inner: WaitQueue<MessagePtr>,
}

impl Mailbox {
    pub fn new() -> Result<Self, SyscallError> {
        Ok(Self {
            inner: WaitQueue::new()?,
        })
    }

    /// Enqueue a message (any thread).
    pub fn enqueue(&self, msg: MessagePtr) {
        self.inner.enqueue(msg);
    }

    /// Blocking dequeue. Owning worker thread only.
    pub fn dequeue(&self) -> MessagePtr {
        self.inner.dequeue()
    }

    /// Timed dequeue; `None` on timeout. Owning worker thread only.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<MessagePtr> {
        self.inner.dequeue_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_enqueue_then_dequeue() {
        let q = WaitQueue::new().expect("waitqueue");
        q.enqueue(41u32);
        q.enqueue(42);
        assert_eq!(q.dequeue(), 41);
        assert_eq!(q.dequeue(), 42);
    }

    #[test]
    fn test_timed_dequeue_empty() {
        let q: WaitQueue<u32> = WaitQueue::new().expect("waitqueue");
        let start = Instant::now();
        assert!(q.dequeue_timeout(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_timed_dequeue_sees_pending_item() {
        let q = WaitQueue::new().expect("waitqueue");
        q.enqueue(7u32);
        assert_eq!(q.dequeue_timeout(Duration::from_millis(100)), Some(7));
    }

    #[test]
    fn test_blocking_dequeue_wakes_on_enqueue() {
        let q = Arc::new(WaitQueue::new().expect("waitqueue"));
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.dequeue())
        };
        thread::sleep(Duration::from_millis(10));
        q.enqueue(99u32);
        assert_eq!(consumer.join().expect("consumer panicked"), 99);
    }

    #[test]
    fn test_many_producers_nothing_lost() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 1_000;

        let q = Arc::new(WaitQueue::new().expect("waitqueue"));
        let mut handles = Vec::new();
        for p in 0..PRODUCERS {
            let q = Arc::clone(&q);
            handles.push(thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    q.enqueue(p * PER_PRODUCER + i);
                }
            }));
        }

        let mut seen = vec![false; PRODUCERS * PER_PRODUCER];
        for _ in 0..PRODUCERS * PER_PRODUCER {
            let item = q.dequeue();
            assert!(!seen[item], "duplicate delivery of {}", item);
            seen[item] = true;
        }
        assert!(seen.iter().all(|&s| s));

        for handle in handles {
            handle.join().expect("producer panicked");
        }
    }
}
