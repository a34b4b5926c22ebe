// SPDX-License-Identifier: Apache-2.0

//! Exponential backoff for sender/receiver rebuild loops. The packet-plane
//! runtime never retries a failed send or receive automatically (callers
//! rebuild the sender/receiver themselves); this helper paces those rebuild
//! attempts.

use std::time::Duration;

/// Multiplies the wait time by `wait_time_multiplier` (clamped to `>= 1.0`)
/// on every call to [`ExponentialBackoff::next_wait`], capped at
/// `max_wait_time`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_wait_time: Duration,
    current_wait_time: Duration,
    max_wait_time: Duration,
    wait_time_multiplier: f64,
}

impl ExponentialBackoff {
    pub fn new(initial_wait_time: Duration, max_wait_time: Duration, wait_time_multiplier: f64) -> Self {
        Self {
            initial_wait_time,
            current_wait_time: initial_wait_time,
            max_wait_time,
            wait_time_multiplier: wait_time_multiplier.max(1.0),
        }
    }

    /// Returns the wait duration for this attempt, then advances the
    /// internal state for the next call.
    pub fn next_wait(&mut self) -> Duration {
        let wait = self.current_wait_time;
        let scaled = self.current_wait_time.as_secs_f64() * self.wait_time_multiplier;
        self.current_wait_time = Duration::from_secs_f64(scaled).min(self.max_wait_time);
        wait
    }

    pub fn reset(&mut self) {
        self.current_wait_time = self.initial_wait_time;
    }
}
