//! Real-time watchdog for stuck simulations.
//!
//! The run loop consults the watchdog when foreground tasks are alive, no task
//! is runnable and no foreground event is pending. Inside the world nothing can
//! change that; only a waker fired from another thread could. The watchdog
//! gives such wakers a bounded window before the run is declared stalled.

use std::time::{Duration, Instant};

use super::task::ReadyQueue;

/// Bounded wait for an external wake-up.
#[derive(Debug, Clone)]
pub(crate) struct StallWatchdog {
    timeout: Duration,
    poll_interval: Duration,
}

impl StallWatchdog {
    pub(crate) fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval: poll_interval.max(Duration::from_micros(50)),
        }
    }

    /// Wait until `ready` has work or the timeout elapses.
    ///
    /// Returns `true` if a task became runnable.
    pub(crate) fn wait_for_wakeup(&self, ready: &ReadyQueue) -> bool {
        let deadline = Instant::now() + self.timeout;
        loop {
            if !ready.is_empty() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }
}
