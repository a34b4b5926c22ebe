// SPDX-License-Identifier: Apache-2.0

//! A bounded, FIFO, multi-producer/multi-consumer queue with blocking and
//! timed push/pop. This is the only datum shared across worker and
//! application tasks in the rest of the crate; all access goes through its
//! internal mutex.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::trace;

struct Inner<T> {
    state: Mutex<VecDeque<T>>,
    capacity: usize,
    not_empty: Notify,
    not_full: Notify,
}

/// A bounded FIFO queue. Cheap to clone — clones share the same backing
/// storage, which is how a queue is handed to a background worker on one
/// side and an application on the other (C8 relies on this).
pub struct Queue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Queue<T> {
    /// Creates a queue with the given capacity. A non-positive capacity is
    /// clamped to 1: a zero-capacity queue can never hold an item, which
    /// would make every push a permanent block.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(VecDeque::new()),
                capacity: capacity.max(1),
                not_empty: Notify::new(),
                not_full: Notify::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live handles to this queue (clones share one `Arc`). A
    /// detached background worker that holds one handle and hands the other
    /// to its caller can poll this to notice the caller dropped theirs:
    /// `handle_count() <= 1` means no one else can still pop.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Blocks until there is space for `v` or `timeout` elapses. Returns
    /// whether `v` was enqueued.
    pub async fn push(&self, v: T, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut item = Some(v);
        loop {
            let notified = self.inner.not_full.notified();
            {
                let mut q = self.lock();
                if q.len() < self.inner.capacity {
                    #[allow(clippy::unwrap_used)]
                    q.push_back(item.take().unwrap());
                    drop(q);
                    self.inner.not_empty.notify_one();
                    return true;
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return false;
            }
        }
    }

    /// Non-blocking push. Drops `v` and returns `false` if the queue is
    /// full.
    pub fn try_push(&self, v: T) -> bool {
        let mut q = self.lock();
        if q.len() < self.inner.capacity {
            q.push_back(v);
            drop(q);
            self.inner.not_empty.notify_one();
            true
        } else {
            // trace, not warn: callers that retry on a full queue (C8's
            // push_never_drop) apply their own throttled warning, and this
            // fires on every failed attempt of a tight retry loop.
            trace!(capacity = self.inner.capacity, "queue full, dropping item");
            false
        }
    }

    /// Waits, without a deadline, until there is space and enqueues `v`.
    pub async fn emplace(&self, v: T) {
        let mut item = Some(v);
        loop {
            let notified = self.inner.not_full.notified();
            {
                let mut q = self.lock();
                if q.len() < self.inner.capacity {
                    #[allow(clippy::unwrap_used)]
                    q.push_back(item.take().unwrap());
                    drop(q);
                    self.inner.not_empty.notify_one();
                    return;
                }
            }
            notified.await;
        }
    }

    /// Waits, without a deadline, for an item and returns it.
    pub async fn pop(&self) -> T {
        loop {
            let notified = self.inner.not_empty.notified();
            {
                let mut q = self.lock();
                if let Some(v) = q.pop_front() {
                    drop(q);
                    self.inner.not_full.notify_one();
                    return v;
                }
            }
            notified.await;
        }
    }

    /// Waits up to `timeout` for an item.
    pub async fn try_pop(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.inner.not_empty.notified();
            {
                let mut q = self.lock();
                if let Some(v) = q.pop_front() {
                    drop(q);
                    self.inner.not_full.notify_one();
                    return Some(v);
                }
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn fifo_ordering() {
        let q: Queue<i32> = Queue::new(4);
        for i in 0..4 {
            assert!(q.push(i, Duration::from_millis(10)).await);
        }
        for i in 0..4 {
            assert_eq!(q.pop().await, i);
        }
    }

    #[tokio::test]
    async fn bound_is_respected() {
        let q: Queue<i32> = Queue::new(2);
        assert!(q.push(1, Duration::from_millis(10)).await);
        assert!(q.push(2, Duration::from_millis(10)).await);
        assert!(!q.push(3, Duration::from_millis(20)).await);
        assert_eq!(q.len(), q.capacity());
    }

    #[tokio::test]
    async fn try_push_drops_on_full() {
        let q: Queue<i32> = Queue::new(1);
        assert!(q.try_push(1));
        assert!(!q.try_push(2));
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn try_pop_times_out_on_empty() {
        let q: Queue<i32> = Queue::new(1);
        assert_eq!(q.try_pop(Duration::from_millis(20)).await, None);
    }

    #[tokio::test]
    async fn push_unblocks_waiting_pop() {
        let q: Queue<i32> = Queue::new(1);
        let q2 = q.clone();
        let popper = tokio::spawn(async move { q2.pop().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(q.push(42, Duration::from_millis(100)).await);
        #[allow(clippy::unwrap_used)]
        let v = popper.await.unwrap();
        assert_eq!(v, 42);
    }

    #[tokio::test]
    async fn handle_count_tracks_clones() {
        let q: Queue<i32> = Queue::new(1);
        assert_eq!(q.handle_count(), 1);
        let q2 = q.clone();
        assert_eq!(q.handle_count(), 2);
        drop(q2);
        assert_eq!(q.handle_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_push_pop_preserves_order() {
        let q: Queue<i32> = Queue::new(8);
        let producer_q = q.clone();
        let producer = tokio::spawn(async move {
            for i in 0..200 {
                producer_q.emplace(i).await;
            }
        });
        let mut received = Vec::new();
        while received.len() < 200 {
            received.push(q.pop().await);
        }
        #[allow(clippy::unwrap_used)]
        producer.await.unwrap();
        let expected: Vec<i32> = (0..200).collect();
        assert_eq!(received, expected);
    }
}
