//! The node library.
//!
//! Every builder returns a concrete `Rc<...>` handle that coerces into a
//! [`NodeRef`](crate::NodeRef), so topologies compose as nested calls:
//!
//! ```ignore
//! let top = cable(1.0, queue_exclusive(delay_fixed(20.0, server("x"))?))?;
//! ```
//!
//! Builders that take durations or counts validate them and fail with
//! `InvalidArgument`.

mod admission;
mod balancer;
mod delay;
mod fault;
mod queue;
mod retry;

pub use admission::{limit_conn, LimitConn};
pub use balancer::{lb_min_conn, lb_random, lb_rr, pool, BalancePolicy, LoadBalancer, Pool};
pub use delay::{
    cable, cable_asymmetric, delay_exponential, delay_fixed, delay_uniform, server, Cable,
    DelayExponential, DelayFixed, DelayUniform, Server,
};
pub use fault::{faulty, Faulty};
pub use queue::{queue_exclusive, QueueExclusive};
pub use retry::{retry, Retry};
