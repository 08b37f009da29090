use std::time::Duration;

use thiserror::Error;

/// Errors that abort a simulation run.
///
/// These are host-side faults: misuse of the scheduler, invalid builder
/// arguments, or a topology that can no longer make progress. Failures that
/// are part of the modeled system (an unavailable server, a rejected
/// connection) are [`SimulatedError`]s and travel inside a request's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    /// The simulation has been shut down and is no longer accessible.
    #[error("Simulation has been shut down")]
    SimulationShutdown,
    /// An argument was outside its valid domain (negative delay, zero pool size...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The scheduler was used in a state that does not allow the operation.
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),
    /// Tasks remain blocked but no event is pending and nothing woke them.
    #[error("Scheduler stalled at {at:?}: {blocked_tasks} task(s) blocked with no pending event")]
    SchedulerStalled {
        /// Number of foreground tasks still alive when the watchdog fired.
        blocked_tasks: usize,
        /// Virtual time at which the stall was detected.
        at: Duration,
    },
}

/// A type alias for `Result<T, SimulationError>`.
pub type SimulationResult<T> = Result<T, SimulationError>;

/// A failure produced by the simulated topology itself.
///
/// Never aborts a run: it is recorded in [`crate::Outcome::Error`] and is
/// consumed by `retry` and by balancer health tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum SimulatedError {
    /// The target was in its Down phase (`faulty`).
    #[error("unavailable")]
    Unavailable,
    /// Admission control refused the request (`limit_conn`).
    #[error("rejected")]
    Rejected,
    /// Any other modeled failure.
    #[error("{0}")]
    Failed(String),
}
