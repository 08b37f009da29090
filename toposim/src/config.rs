//! Scheduler configuration.

use std::time::Duration;

/// Configuration for a [`crate::SimWorld`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfiguration {
    /// Seed installed in the thread-local simulation RNG on construction.
    pub seed: u64,
    /// Real time the run loop waits for an external wake-up before declaring
    /// the simulation stalled.
    pub stall_timeout: Duration,
    /// How often the watchdog re-checks the ready queue while waiting.
    pub stall_poll_interval: Duration,
}

impl Default for SchedulerConfiguration {
    fn default() -> Self {
        Self {
            seed: 0,
            stall_timeout: Duration::from_secs(1),
            stall_poll_interval: Duration::from_millis(1),
        }
    }
}

impl SchedulerConfiguration {
    /// Default configuration with a specific seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Configuration that reports stalls after a few milliseconds.
    ///
    /// Intended for tests that deliberately build a stuck topology.
    pub fn fast_stall_detection() -> Self {
        Self {
            stall_timeout: Duration::from_millis(20),
            stall_poll_interval: Duration::from_millis(1),
            ..Self::default()
        }
    }
}
