// SPDX-License-Identifier: Apache-2.0

//! A generic background-worker trait. Each of the puller and decoder-driver
//! tasks in `streams-client` implements this so they can be started,
//! observed, and torn down uniformly.

use async_trait::async_trait;

/// A worker runs an async loop until its owning handle is dropped or it
/// observes a terminal condition. Boxed as `Box<dyn Worker + Send>` where
/// the concrete type doesn't matter to the caller.
#[async_trait]
pub trait Worker {
    /// Main worker loop. Expected to run until a shutdown condition is met
    /// and then return.
    async fn run(&mut self);

    /// Hook called when the worker loop exits, used to flush or log final
    /// state. Defaults to a no-op.
    fn shutdown(&mut self) {}
}

#[async_trait]
impl Worker for Box<dyn Worker + Send> {
    async fn run(&mut self) {
        (**self).run().await
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}
