//! Delay, transport and terminal nodes.
//!
//! All simulated processing time in a topology comes from these wrappers;
//! [`Server`] itself is instantaneous.

use std::{rc::Rc, time::Duration};

use async_trait::async_trait;
use rand_distr::Exp;

use crate::{
    error::{SimulationError, SimulationResult},
    node::{Node, NodeRef},
    request::Request,
    sim::{
        rng::{exponential, sim_random_range_or_default, sim_sample},
        world::duration_from_ms,
        SimContext,
    },
};

// ============================================================================
// Server
// ============================================================================

/// Terminal node: marks the request as served by `label`.
#[derive(Debug)]
pub struct Server {
    label: String,
}

impl Server {
    /// The label stamped on served requests.
    pub fn label(&self) -> &str {
        &self.label
    }
}

#[async_trait(?Send)]
impl Node for Server {
    async fn process(&self, _ctx: &SimContext, req: Request) -> SimulationResult<Request> {
        Ok(req.succeed(self.label.as_str()))
    }

    fn describe(&self) -> String {
        format!("server({})", self.label)
    }
}

/// Builds a terminal server node.
pub fn server(label: impl Into<String>) -> Rc<Server> {
    Rc::new(Server {
        label: label.into(),
    })
}

// ============================================================================
// Fixed delay
// ============================================================================

/// Sleeps a constant amount, then forwards.
pub struct DelayFixed {
    ms: f64,
    delay: Duration,
    inner: NodeRef,
}

#[async_trait(?Send)]
impl Node for DelayFixed {
    async fn process(&self, ctx: &SimContext, req: Request) -> SimulationResult<Request> {
        ctx.sleep(self.delay).await?;
        self.inner.process(ctx, req).await
    }

    fn start(&self, ctx: &SimContext) -> SimulationResult<()> {
        self.inner.start(ctx)
    }

    fn describe(&self) -> String {
        format!("delay_fixed({}, {})", self.ms, self.inner.describe())
    }
}

/// Sleeps exactly `ms` milliseconds before forwarding to `inner`.
pub fn delay_fixed(ms: f64, inner: NodeRef) -> SimulationResult<Rc<DelayFixed>> {
    Ok(Rc::new(DelayFixed {
        ms,
        delay: duration_from_ms(ms)?,
        inner,
    }))
}

// ============================================================================
// Exponential delay
// ============================================================================

/// Sleeps one exponential sample, then forwards.
pub struct DelayExponential {
    mean_ms: f64,
    dist: Exp<f64>,
    inner: NodeRef,
}

#[async_trait(?Send)]
impl Node for DelayExponential {
    async fn process(&self, ctx: &SimContext, req: Request) -> SimulationResult<Request> {
        let sample: f64 = sim_sample(&self.dist);
        ctx.sleep_ms(sample).await?;
        self.inner.process(ctx, req).await
    }

    fn start(&self, ctx: &SimContext) -> SimulationResult<()> {
        self.inner.start(ctx)
    }

    fn describe(&self) -> String {
        format!("delay_exponential({}, {})", self.mean_ms, self.inner.describe())
    }
}

/// Sleeps an Exponential(`mean_ms`) sample before forwarding to `inner`.
pub fn delay_exponential(mean_ms: f64, inner: NodeRef) -> SimulationResult<Rc<DelayExponential>> {
    Ok(Rc::new(DelayExponential {
        mean_ms,
        dist: exponential(mean_ms)?,
        inner,
    }))
}

// ============================================================================
// Uniform delay
// ============================================================================

/// Sleeps one uniform sample in `[min_ms, max_ms)`, then forwards.
pub struct DelayUniform {
    min_ms: f64,
    max_ms: f64,
    inner: NodeRef,
}

#[async_trait(?Send)]
impl Node for DelayUniform {
    async fn process(&self, ctx: &SimContext, req: Request) -> SimulationResult<Request> {
        let sample = sim_random_range_or_default(self.min_ms..self.max_ms);
        ctx.sleep_ms(sample).await?;
        self.inner.process(ctx, req).await
    }

    fn start(&self, ctx: &SimContext) -> SimulationResult<()> {
        self.inner.start(ctx)
    }

    fn describe(&self) -> String {
        format!(
            "delay_uniform({}, {}, {})",
            self.min_ms,
            self.max_ms,
            self.inner.describe()
        )
    }
}

/// Sleeps a Uniform[`min_ms`, `max_ms`) sample before forwarding to `inner`.
///
/// `min_ms == max_ms` degenerates to a fixed delay.
pub fn delay_uniform(
    min_ms: f64,
    max_ms: f64,
    inner: NodeRef,
) -> SimulationResult<Rc<DelayUniform>> {
    duration_from_ms(min_ms)?;
    duration_from_ms(max_ms)?;
    if min_ms > max_ms {
        return Err(SimulationError::InvalidArgument(format!(
            "delay_uniform: min {min_ms} > max {max_ms}"
        )));
    }
    Ok(Rc::new(DelayUniform {
        min_ms,
        max_ms,
        inner,
    }))
}

// ============================================================================
// Cable
// ============================================================================

/// Transport delay applied on the way in and again on the way out.
pub struct Cable {
    request_ms: f64,
    response_ms: f64,
    request_delay: Duration,
    response_delay: Duration,
    inner: NodeRef,
}

#[async_trait(?Send)]
impl Node for Cable {
    async fn process(&self, ctx: &SimContext, req: Request) -> SimulationResult<Request> {
        ctx.sleep(self.request_delay).await?;
        let req = self.inner.process(ctx, req).await?;
        ctx.sleep(self.response_delay).await?;
        Ok(req)
    }

    fn start(&self, ctx: &SimContext) -> SimulationResult<()> {
        self.inner.start(ctx)
    }

    fn describe(&self) -> String {
        if self.request_ms == self.response_ms {
            format!("cable({}, {})", self.request_ms, self.inner.describe())
        } else {
            format!(
                "cable_asymmetric({}, {}, {})",
                self.request_ms,
                self.response_ms,
                self.inner.describe()
            )
        }
    }
}

/// Symmetric round-trip transport: `latency_ms` each way.
pub fn cable(latency_ms: f64, inner: NodeRef) -> SimulationResult<Rc<Cable>> {
    cable_asymmetric(latency_ms, latency_ms, inner)
}

/// Transport with distinct request-path and response-path latencies.
pub fn cable_asymmetric(
    request_ms: f64,
    response_ms: f64,
    inner: NodeRef,
) -> SimulationResult<Rc<Cable>> {
    Ok(Rc::new(Cable {
        request_ms,
        response_ms,
        request_delay: duration_from_ms(request_ms)?,
        response_delay: duration_from_ms(response_ms)?,
        inner,
    }))
}
