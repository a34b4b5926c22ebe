// SPDX-License-Identifier: Apache-2.0
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Shared foundation for the packet-streaming client: canonical status
//! kinds, a bounded producer/consumer queue, a one-shot completion signal,
//! a reconnect backoff helper, and a background-worker trait. None of this
//! module knows about packets or RPCs; those live in `streams-client`.

pub mod backoff;
pub mod completion;
pub mod queue;
pub mod status;
pub mod worker;

pub use completion::CompletionSignal;
pub use queue::Queue;
pub use status::{Status, StatusKind};
pub use worker::Worker;
