//! Core simulation engine.
//!
//! ## Submodules
//!
//! - `world` - SimWorld (clock, event queue, task registry, run loop)
//! - `events` - Event types and the ordered event queue
//! - `task` - Task ids, states, wakers and join handles
//! - `sleep` - Sleep future for simulation time
//! - `context` - Handle given to tasks and nodes
//! - `rng` - Thread-local random number generation
//! - `watchdog` - Real-time bound on stalled runs
//! - `metrics` - Run counters

pub mod context;
pub mod events;
pub mod metrics;
pub mod rng;
pub mod sleep;
pub mod task;
mod watchdog;
pub mod world;

pub use context::SimContext;
pub use events::{Event, EventQueue, ScheduledEvent};
pub use metrics::SimulationMetrics;
pub use rng::{
    get_current_sim_seed, reset_sim_rng, set_sim_seed, sim_random, sim_random_exponential,
    sim_random_f64, sim_random_range, sim_random_range_or_default,
};
pub use sleep::SleepFuture;
pub use task::{JoinHandle, TaskId, TaskState};
pub use world::{SimWorld, WeakSimWorld};
