//! Sleep future for simulation time.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use crate::error::SimulationResult;

use super::world::WeakSimWorld;

/// Future returned by [`crate::SimWorld::sleep`].
///
/// Resolves once the world has processed the matching wake event, which
/// happens exactly when the clock reaches the registered wake time.
#[derive(Debug)]
#[must_use = "a sleep does nothing unless awaited"]
pub struct SleepFuture {
    sim: WeakSimWorld,
    token: u64,
    until: Duration,
}

impl SleepFuture {
    pub(crate) fn new(sim: WeakSimWorld, token: u64, until: Duration) -> Self {
        Self { sim, token, until }
    }

    /// Virtual time at which this sleep completes.
    pub fn until(&self) -> Duration {
        self.until
    }
}

impl Future for SleepFuture {
    type Output = SimulationResult<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.sim.upgrade() {
            Ok(sim) => sim.poll_sleep(self.token, cx.waker()),
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl Drop for SleepFuture {
    fn drop(&mut self) {
        if let Ok(sim) = self.sim.upgrade() {
            sim.forget_sleep(self.token);
        }
    }
}
