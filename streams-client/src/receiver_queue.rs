// SPDX-License-Identifier: Apache-2.0

//! Receiver queue wrapper (C8): a detached background puller that feeds a
//! bounded queue from a [`PacketReceiver`], terminating the queue with a
//! synthetic EOS packet on upstream failure.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::warn;

use streams_common::{Queue, Status, StatusKind, Worker};

use crate::packet::{make_eos_packet, Packet};
use crate::receiver::{PacketReceiver, ReceiverOptions};

const DEFAULT_BUFFER_CAPACITY: usize = 300;
const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(5);
const RETRY_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Clone)]
pub struct ReceiverQueueOptions {
    pub receiver: ReceiverOptions,
    /// Clamped to [`DEFAULT_BUFFER_CAPACITY`] when non-positive.
    pub buffer_capacity: usize,
    /// How often a full queue logs a warning while the puller keeps
    /// retrying; packets are never dropped silently.
    pub retry_window: Duration,
}

impl Default for ReceiverQueueOptions {
    fn default() -> Self {
        Self {
            receiver: ReceiverOptions::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            retry_window: DEFAULT_RETRY_WINDOW,
        }
    }
}

struct Puller {
    receiver: PacketReceiver,
    queue: Queue<Packet>,
    retry_window: Duration,
}

/// Pushes `packet`, retrying `try_push` until it succeeds or the queue's
/// last consumer share is dropped. Logs a warning every `retry_window` of
/// continuous backpressure; never gives up and drops the packet.
async fn push_never_drop(queue: &Queue<Packet>, packet: Packet, retry_window: Duration) -> bool {
    let mut window_start = Instant::now();
    loop {
        if queue.handle_count() <= 1 {
            return false;
        }
        // `try_push` drops its argument on a full queue, so retry with a
        // clone rather than moving `packet` away on a failed attempt.
        if queue.try_push(packet.clone()) {
            return true;
        }
        if window_start.elapsed() >= retry_window {
            warn!(
                capacity = queue.capacity(),
                "receiver queue has been full for {:?}; still retrying, no packets dropped",
                retry_window
            );
            window_start = Instant::now();
        }
        tokio::time::sleep(RETRY_POLL_INTERVAL).await;
    }
}

#[async_trait]
impl Worker for Puller {
    async fn run(&mut self) {
        loop {
            if self.queue.handle_count() <= 1 {
                break;
            }
            match self.receiver.receive().await {
                Ok(packet) => {
                    if !push_never_drop(&self.queue, packet, self.retry_window).await {
                        break;
                    }
                }
                Err(status) => {
                    let eos = make_eos_packet(format!("upstream receive failed: {status}"));
                    let _ = push_never_drop(&self.queue, eos, self.retry_window).await;
                    break;
                }
            }
        }
    }

    fn shutdown(&mut self) {
        tracing::debug!("receiver queue puller shutting down");
    }
}

/// Spawns the detached puller and returns the caller's queue handle plus a
/// join handle for the background task.
pub async fn make_packet_receiver_queue(
    options: ReceiverQueueOptions,
) -> Result<(Queue<Packet>, tokio::task::JoinHandle<()>), Status> {
    let capacity = if options.buffer_capacity == 0 {
        DEFAULT_BUFFER_CAPACITY
    } else {
        options.buffer_capacity
    };
    let queue = Queue::new(capacity);
    let worker_queue = queue.clone();
    let receiver = PacketReceiver::connect(options.receiver).await?;
    let mut puller = Puller {
        receiver,
        queue: worker_queue,
        retry_window: options.retry_window,
    };
    let handle = tokio::spawn(async move {
        puller.run().await;
        puller.shutdown();
    });
    Ok((queue, handle))
}

/// Convenience wrapper: spawns a receiver queue and delivers packets to
/// `callback`, turning a pop timeout into a synthetic EOS rather than
/// stalling forever.
pub async fn receive_packets<F>(
    options: ReceiverQueueOptions,
    pop_timeout: Duration,
    mut callback: F,
) -> Status
where
    F: FnMut(Packet) -> Status,
{
    let (queue, _worker) = match make_packet_receiver_queue(options).await {
        Ok(pair) => pair,
        Err(status) => return status,
    };
    loop {
        let packet = match queue.try_pop(pop_timeout).await {
            Some(packet) => packet,
            None => make_eos_packet("pop timed out waiting for a packet"),
        };
        let status = callback(packet);
        if status.kind() == StatusKind::Cancelled {
            return Status::ok();
        }
        if !status.is_ok() {
            warn!(status = %status, "receive_packets callback returned a non-cancelling error");
        }
    }
}
