//! Up/down availability cycling.

use std::{cell::Cell, rc::Rc, time::Duration};

use async_trait::async_trait;
use rand_distr::Exp;

use crate::{
    error::{SimulatedError, SimulationResult},
    node::{Node, NodeRef},
    request::Request,
    sim::{
        rng::{exponential, sim_sample},
        SimContext,
    },
};

/// Availability state shared between a [`Faulty`] node and its cycle task.
#[derive(Debug, Default)]
struct Availability {
    down: Cell<bool>,
    /// Instant the current cycle started.
    started_at: Cell<Duration>,
    since: Cell<Duration>,
    down_total: Cell<Duration>,
    transitions: Cell<u64>,
}

impl Availability {
    fn restart(&self, now: Duration) {
        self.down.set(false);
        self.started_at.set(now);
        self.since.set(now);
        self.down_total.set(Duration::ZERO);
        self.transitions.set(0);
    }

    fn go_down(&self, now: Duration) {
        self.down.set(true);
        self.since.set(now);
        self.transitions.set(self.transitions.get() + 1);
    }

    fn go_up(&self, now: Duration) {
        let spent = now.saturating_sub(self.since.get());
        self.down_total.set(self.down_total.get() + spent);
        self.down.set(false);
        self.since.set(now);
        self.transitions.set(self.transitions.get() + 1);
    }

    fn down_time(&self, now: Duration) -> Duration {
        let closed = self.down_total.get();
        if self.down.get() {
            closed + now.saturating_sub(self.since.get())
        } else {
            closed
        }
    }

    fn down_fraction(&self, now: Duration) -> f64 {
        let observed = now.saturating_sub(self.started_at.get());
        if observed.is_zero() {
            return 0.0;
        }
        self.down_time(now).as_secs_f64() / observed.as_secs_f64()
    }
}

/// Alternates between Up and Down with exponentially distributed durations.
///
/// While Up requests pass through to `inner`. While Down they fail
/// immediately with [`SimulatedError::Unavailable`]; the state is checked
/// only when a request arrives, so requests already inside `inner` are not
/// affected by a later transition. The cycle starts Up, at the first
/// submission of each epoch of each world, and runs as a daemon task.
pub struct Faulty {
    up_mean_ms: f64,
    down_mean_ms: f64,
    up: Exp<f64>,
    down: Exp<f64>,
    state: Rc<Availability>,
    /// `(world_id, epoch)` of the running cycle.
    started: Cell<Option<(u64, u64)>>,
    inner: NodeRef,
}

impl Faulty {
    /// Returns `true` while requests pass through.
    pub fn is_up(&self) -> bool {
        !self.state.down.get()
    }

    /// Number of Up/Down transitions in the current epoch.
    pub fn transitions(&self) -> u64 {
        self.state.transitions.get()
    }

    /// Total virtual time spent Down since the cycle started.
    pub fn down_time(&self, now: Duration) -> Duration {
        self.state.down_time(now)
    }

    /// Fraction of the time between the cycle start and `now` spent Down.
    pub fn down_fraction(&self, now: Duration) -> f64 {
        self.state.down_fraction(now)
    }

    /// Instant the current cycle started.
    pub fn cycle_start(&self) -> Duration {
        self.state.started_at.get()
    }

    fn spawn_cycle(&self, ctx: &SimContext) -> SimulationResult<()> {
        self.state.restart(ctx.now()?);
        let state = self.state.clone();
        let (up, down) = (self.up.clone(), self.down.clone());
        let cycle_ctx = ctx.clone();
        let task_id = ctx.spawn_daemon(async move {
            loop {
                let up_ms: f64 = sim_sample(&up);
                if cycle_ctx.sleep_ms(up_ms).await.is_err() {
                    return;
                }
                let Ok(now) = cycle_ctx.now() else { return };
                state.go_down(now);
                tracing::debug!(at = ?now, "node down");

                let down_ms: f64 = sim_sample(&down);
                if cycle_ctx.sleep_ms(down_ms).await.is_err() {
                    return;
                }
                let Ok(now) = cycle_ctx.now() else { return };
                state.go_up(now);
                tracing::debug!(at = ?now, "node up");
            }
        })?;
        tracing::trace!(%task_id, "availability cycle started");
        Ok(())
    }
}

#[async_trait(?Send)]
impl Node for Faulty {
    async fn process(&self, ctx: &SimContext, req: Request) -> SimulationResult<Request> {
        if self.state.down.get() {
            tracing::trace!(request = %req.id, "rejected while down");
            return Ok(req.fail(SimulatedError::Unavailable));
        }
        self.inner.process(ctx, req).await
    }

    fn start(&self, ctx: &SimContext) -> SimulationResult<()> {
        let run = (ctx.world_id()?, ctx.epoch()?);
        if self.started.get() != Some(run) {
            self.started.set(Some(run));
            self.spawn_cycle(ctx)?;
        }
        self.inner.start(ctx)
    }

    fn describe(&self) -> String {
        format!(
            "faulty({}, {}, {})",
            self.up_mean_ms,
            self.down_mean_ms,
            self.inner.describe()
        )
    }
}

/// Wraps `inner` in an availability cycle with the given mean Up and Down
/// durations in milliseconds.
pub fn faulty(up_mean_ms: f64, down_mean_ms: f64, inner: NodeRef) -> SimulationResult<Rc<Faulty>> {
    Ok(Rc::new(Faulty {
        up_mean_ms,
        down_mean_ms,
        up: exponential(up_mean_ms)?,
        down: exponential(down_mean_ms)?,
        state: Rc::new(Availability::default()),
        started: Cell::new(None),
        inner,
    }))
}
