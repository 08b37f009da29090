//! Counters collected by the run loop.

use std::time::Duration;

/// Core metrics collected during a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationMetrics {
    /// Wall-clock time taken for the run
    pub wall_time: Duration,
    /// Simulated logical time elapsed
    pub simulated_time: Duration,
    /// Number of wake events processed
    pub events_processed: u64,
    /// Number of tasks spawned (foreground and daemon)
    pub tasks_spawned: u64,
    /// Number of times a task future was polled
    pub polls: u64,
}
