//! Worker pools and the load balancers that dispatch into them.
//!
//! A [`Pool`] is a fixed, ordered set of independent workers. Each balancer
//! owns its pool and counts in-flight requests per worker: the counter is
//! raised before dispatch and lowered as soon as the worker returns, whatever
//! the outcome.

use std::{cell::Cell, rc::Rc, time::Duration};

use async_trait::async_trait;

use crate::{
    error::{SimulationError, SimulationResult},
    node::{Node, NodeRef},
    request::Request,
    sim::{rng::sim_random_range, world::duration_from_ms, SimContext},
};

// ============================================================================
// Pool
// ============================================================================

/// Fixed ordered sequence of workers with per-worker counters.
pub struct Pool {
    workers: Vec<NodeRef>,
    connections: Vec<Cell<usize>>,
    dispatched: Vec<Cell<u64>>,
}

impl Pool {
    /// Builds `n` workers by calling `factory` with each index in order.
    pub fn new<F>(n: usize, mut factory: F) -> SimulationResult<Self>
    where
        F: FnMut(usize) -> SimulationResult<NodeRef>,
    {
        if n == 0 {
            return Err(SimulationError::InvalidArgument(
                "pool needs at least one worker".to_string(),
            ));
        }
        let workers = (0..n).map(&mut factory).collect::<SimulationResult<Vec<_>>>()?;
        Ok(Self {
            workers,
            connections: (0..n).map(|_| Cell::new(0)).collect(),
            dispatched: (0..n).map(|_| Cell::new(0)).collect(),
        })
    }

    /// Number of workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Always `false`; a pool has at least one worker.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Worker at `index`.
    pub fn worker(&self, index: usize) -> Option<&NodeRef> {
        self.workers.get(index)
    }

    /// Current in-flight count of every worker, in pool order.
    pub fn connections(&self) -> Vec<usize> {
        self.connections.iter().map(Cell::get).collect()
    }

    /// Total requests dispatched to every worker, in pool order.
    pub fn dispatched(&self) -> Vec<u64> {
        self.dispatched.iter().map(Cell::get).collect()
    }

    fn describe(&self) -> String {
        let first = self.workers[0].describe();
        format!("pool({}, {first})", self.workers.len())
    }
}

/// Holds one in-flight slot on a worker until dropped.
struct ConnectionGuard<'a> {
    counter: &'a Cell<usize>,
}

impl<'a> ConnectionGuard<'a> {
    fn acquire(counter: &'a Cell<usize>) -> Self {
        counter.set(counter.get() + 1);
        Self { counter }
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.counter.set(self.counter.get() - 1);
    }
}

// ============================================================================
// Balancer
// ============================================================================

/// How a [`LoadBalancer`] picks a worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BalancePolicy {
    /// Uniformly random worker.
    Random,
    /// Workers in pool order, cycling.
    RoundRobin,
    /// Fewest in-flight requests, lowest index on ties.
    ///
    /// With `error_hold` set, a worker that returned an error within the last
    /// `error_hold` is skipped, unless every worker is held.
    MinConnections {
        /// How long an erroring worker is avoided.
        error_hold: Option<Duration>,
    },
}

/// Dispatches each request to one worker of its pool.
pub struct LoadBalancer {
    pool: Pool,
    policy: BalancePolicy,
    cursor: Cell<usize>,
    last_error: Vec<Cell<Option<Duration>>>,
}

impl LoadBalancer {
    /// Wraps `pool` with `policy`.
    pub fn new(pool: Pool, policy: BalancePolicy) -> Self {
        let last_error = (0..pool.len()).map(|_| Cell::new(None)).collect();
        Self {
            pool,
            policy,
            cursor: Cell::new(0),
            last_error,
        }
    }

    /// The balanced pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// The selection policy.
    pub fn policy(&self) -> BalancePolicy {
        self.policy
    }

    fn select(&self, now: Duration) -> usize {
        match self.policy {
            BalancePolicy::Random => sim_random_range(0..self.pool.len()),
            BalancePolicy::RoundRobin => {
                let index = self.cursor.get();
                self.cursor.set((index + 1) % self.pool.len());
                index
            }
            BalancePolicy::MinConnections { error_hold } => {
                let held = |index: usize| match (error_hold, self.last_error[index].get()) {
                    // A hold that runs past the end of the clock never expires.
                    (Some(hold), Some(at)) => match at.checked_add(hold) {
                        Some(until) => now < until,
                        None => true,
                    },
                    _ => false,
                };
                let eligible: Vec<usize> = (0..self.pool.len()).filter(|&i| !held(i)).collect();
                let candidates = if eligible.is_empty() {
                    (0..self.pool.len()).collect()
                } else {
                    eligible
                };
                candidates
                    .into_iter()
                    .min_by_key(|&index| self.pool.connections[index].get())
                    .unwrap_or(0)
            }
        }
    }
}

#[async_trait(?Send)]
impl Node for LoadBalancer {
    async fn process(&self, ctx: &SimContext, req: Request) -> SimulationResult<Request> {
        let index = self.select(ctx.now()?);
        tracing::trace!(
            request = %req.id,
            worker = index,
            connections = ?self.pool.connections(),
            "balancing"
        );
        self.pool.dispatched[index].set(self.pool.dispatched[index].get() + 1);

        let result = {
            let _slot = ConnectionGuard::acquire(&self.pool.connections[index]);
            self.pool.workers[index].process(ctx, req).await
        };
        let req = result?;

        if req.is_error() {
            self.last_error[index].set(Some(ctx.now()?));
        }
        Ok(req)
    }

    fn start(&self, ctx: &SimContext) -> SimulationResult<()> {
        self.pool
            .workers
            .iter()
            .try_for_each(|worker| worker.start(ctx))
    }

    fn describe(&self) -> String {
        let name = match self.policy {
            BalancePolicy::Random => "lb_random".to_string(),
            BalancePolicy::RoundRobin => "lb_rr".to_string(),
            BalancePolicy::MinConnections { error_hold: None } => "lb_min_conn".to_string(),
            BalancePolicy::MinConnections {
                error_hold: Some(hold),
            } => format!("lb_min_conn[hold={}ms]", hold.as_nanos() as f64 / 1e6),
        };
        format!("{name}({})", self.pool.describe())
    }
}

/// Builds a pool of `n` workers from `factory`.
pub fn pool<F>(n: usize, factory: F) -> SimulationResult<Pool>
where
    F: FnMut(usize) -> SimulationResult<NodeRef>,
{
    Pool::new(n, factory)
}

/// Picks a uniformly random worker per request.
pub fn lb_random(pool: Pool) -> Rc<LoadBalancer> {
    Rc::new(LoadBalancer::new(pool, BalancePolicy::Random))
}

/// Cycles through workers in pool order.
pub fn lb_rr(pool: Pool) -> Rc<LoadBalancer> {
    Rc::new(LoadBalancer::new(pool, BalancePolicy::RoundRobin))
}

/// Picks the least-loaded worker, optionally avoiding workers that errored
/// within the last `error_hold_ms`.
pub fn lb_min_conn(pool: Pool, error_hold_ms: Option<f64>) -> SimulationResult<Rc<LoadBalancer>> {
    let error_hold = error_hold_ms.map(duration_from_ms).transpose()?;
    Ok(Rc::new(LoadBalancer::new(
        pool,
        BalancePolicy::MinConnections { error_hold },
    )))
}
