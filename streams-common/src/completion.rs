// SPDX-License-Identifier: Apache-2.0

//! A one-shot start/end latch carrying a terminal [`Status`], waitable with
//! a timeout.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::status::Status;

struct Inner {
    completed: Mutex<bool>,
    status: Mutex<Status>,
    notify: Notify,
}

/// Initially completed (there is no work in flight). `start()` clears it;
/// `end(status)` sets it and records the terminal status.
#[derive(Clone)]
pub struct CompletionSignal {
    inner: Arc<Inner>,
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                completed: Mutex::new(true),
                status: Mutex::new(Status::ok()),
                notify: Notify::new(),
            }),
        }
    }

    fn set_completed(&self, v: bool) {
        let mut c = match self.inner.completed.lock() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        *c = v;
    }

    /// Idempotent within a run cycle: clears the completed flag.
    pub fn start(&self) {
        self.set_completed(false);
    }

    /// Idempotent within a run cycle: records `status` and marks complete,
    /// waking any waiters.
    pub fn end(&self, status: Status) {
        {
            let mut s = match self.inner.status.lock() {
                Ok(g) => g,
                Err(p) => p.into_inner(),
            };
            *s = status;
        }
        self.set_completed(true);
        self.inner.notify.notify_waiters();
    }

    pub fn is_completed(&self) -> bool {
        match self.inner.completed.lock() {
            Ok(g) => *g,
            Err(p) => *p.into_inner(),
        }
    }

    /// The caller is responsible for only interpreting this after
    /// completion; it is well-defined to call at any time.
    pub fn status(&self) -> Status {
        match self.inner.status.lock() {
            Ok(g) => g.clone(),
            Err(p) => p.into_inner().clone(),
        }
    }

    /// Returns `true` iff the signal completes within `timeout`.
    pub async fn wait_until_completed(&self, timeout: Duration) -> bool {
        if self.is_completed() {
            return true;
        }
        let notified = self.inner.notify.notified();
        if self.is_completed() {
            return true;
        }
        tokio::time::timeout(timeout, notified).await.is_ok() || self.is_completed()
    }
}
