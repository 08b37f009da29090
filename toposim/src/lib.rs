//! # Toposim
//!
//! Discrete-event simulation of request-processing topologies.
//!
//! A topology is a tree of composable [`Node`]s (delays, queues, pools,
//! load balancers, fault injectors, retries, admission limits) built by
//! nesting builder calls. Requests flow through it under a virtual clock:
//! simulated time only moves when every task is waiting on a sleep, so a run
//! of ten thousand requests takes milliseconds of wall time and the same seed
//! always yields the same latencies.
//!
//! ## Core Components
//!
//! - [`SimWorld`]: virtual clock, event queue and single-threaded executor
//! - [`SimContext`]: handle through which tasks and nodes sleep and spawn
//! - [`nodes`]: the node library
//! - [`workload`]: Poisson and burst arrival generators
//! - [`stats`]: latency and throughput summaries
//!
//! ## Quick Start
//!
//! ```ignore
//! use toposim::{SimWorld, nodes::*, stats::LatencySummary, workload::run_poisson};
//!
//! let sim = SimWorld::new_with_seed(42);
//! sim.reset()?;
//!
//! let top = queue_exclusive(delay_fixed(20.0, delay_exponential(100.0, server("x"))?)?);
//! let requests = run_poisson(&sim, 10_000, 150.0, top)?;
//! let summary = LatencySummary::from_requests(&requests);
//! ```
//!
//! ## Run lifecycle
//!
//! A world is unusable until [`SimWorld::reset`] arms it. Each reset starts a
//! new epoch: the clock returns to zero, pending events and background tasks
//! are dropped and request ids restart. [`SimWorld::await_quiescence`] drives
//! the run until no foreground task is left, or fails with
//! [`SimulationError::SchedulerStalled`] when tasks remain blocked with
//! nothing scheduled to wake them.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// =============================================================================
// Core Modules
// =============================================================================

/// Scheduler configuration.
pub mod config;

/// Host-side and simulated error types.
pub mod error;

/// The node processing contract.
pub mod node;

/// Node combinator library.
pub mod nodes;

/// Requests and their outcomes.
pub mod request;

/// Core simulation engine.
pub mod sim;

/// Latency and rate statistics.
pub mod stats;

/// Workload generators.
pub mod workload;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::SchedulerConfiguration;
pub use error::{SimulatedError, SimulationError, SimulationResult};
pub use node::{submit, Node, NodeRef};
pub use request::{Outcome, Request, RequestId};
pub use sim::{
    get_current_sim_seed, reset_sim_rng, set_sim_seed, sim_random, sim_random_exponential,
    sim_random_f64, sim_random_range, sim_random_range_or_default, JoinHandle, SimContext,
    SimWorld, SimulationMetrics, SleepFuture, TaskId, TaskState, WeakSimWorld,
};
pub use stats::LatencySummary;
pub use workload::{
    generate_burst, generate_poisson, run_burst, run_poisson, submit_request,
};
