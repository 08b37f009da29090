//! Request arrival processes.
//!
//! Generators spawn one foreground task per request. Each task waits for its
//! arrival instant, creates the request, hands it to `submit_fn` and yields
//! the completed request. Results come back in arrival order.

use std::{future::Future, time::Duration};

use crate::{
    error::SimulationResult,
    node::{submit, NodeRef},
    request::Request,
    sim::{
        rng::{exponential, sim_sample},
        world::duration_from_ms,
        JoinHandle, SimContext, SimWorld,
    },
};

/// Default `submit_fn`: [`submit`] with owned arguments.
pub async fn submit_request(
    ctx: SimContext,
    req: Request,
    node: NodeRef,
) -> SimulationResult<Request> {
    submit(&ctx, &node, req).await
}

/// Spawns `count` requests whose arrivals are separated by successive
/// Exponential(`mean_interval_ms`) gaps, starting from the current instant.
///
/// All gaps are sampled before the first request is spawned.
pub async fn generate_poisson<F, Fut>(
    ctx: &SimContext,
    count: usize,
    mean_interval_ms: f64,
    submit_fn: F,
    node: NodeRef,
) -> SimulationResult<Vec<Request>>
where
    F: Fn(SimContext, Request, NodeRef) -> Fut + Clone + 'static,
    Fut: Future<Output = SimulationResult<Request>> + 'static,
{
    let gap = exponential(mean_interval_ms)?;
    let mut offset_ms = 0.0;
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        let sample: f64 = sim_sample(&gap);
        offset_ms += sample;
        offsets.push(duration_from_ms(offset_ms)?);
    }
    tracing::debug!(count, mean_interval_ms, "generating poisson arrivals");

    let handles = offsets
        .into_iter()
        .map(|offset| spawn_arrival(ctx, offset, submit_fn.clone(), node.clone()))
        .collect::<SimulationResult<Vec<_>>>()?;
    join_all(handles).await
}

/// Spawns `count` requests that all arrive at the current instant.
pub async fn generate_burst<F, Fut>(
    ctx: &SimContext,
    count: usize,
    submit_fn: F,
    node: NodeRef,
) -> SimulationResult<Vec<Request>>
where
    F: Fn(SimContext, Request, NodeRef) -> Fut + Clone + 'static,
    Fut: Future<Output = SimulationResult<Request>> + 'static,
{
    tracing::debug!(count, "generating burst");
    let handles = (0..count)
        .map(|_| spawn_arrival(ctx, Duration::ZERO, submit_fn.clone(), node.clone()))
        .collect::<SimulationResult<Vec<_>>>()?;
    join_all(handles).await
}

fn spawn_arrival<F, Fut>(
    ctx: &SimContext,
    offset: Duration,
    submit_fn: F,
    node: NodeRef,
) -> SimulationResult<JoinHandle<SimulationResult<Request>>>
where
    F: Fn(SimContext, Request, NodeRef) -> Fut + 'static,
    Fut: Future<Output = SimulationResult<Request>> + 'static,
{
    let task_ctx = ctx.clone();
    ctx.spawn(async move {
        if !offset.is_zero() {
            task_ctx.sleep(offset).await?;
        }
        let req = task_ctx.new_request()?;
        submit_fn(task_ctx, req, node).await
    })
}

async fn join_all(
    handles: Vec<JoinHandle<SimulationResult<Request>>>,
) -> SimulationResult<Vec<Request>> {
    let mut completed = Vec::with_capacity(handles.len());
    for handle in handles {
        completed.push(handle.await??);
    }
    Ok(completed)
}

/// Runs [`generate_poisson`] against [`submit_request`] to quiescence.
pub fn run_poisson(
    sim: &SimWorld,
    count: usize,
    mean_interval_ms: f64,
    node: NodeRef,
) -> SimulationResult<Vec<Request>> {
    let ctx = sim.context();
    sim.block_on(async move {
        generate_poisson(&ctx, count, mean_interval_ms, submit_request, node).await
    })?
}

/// Runs [`generate_burst`] against [`submit_request`] to quiescence.
pub fn run_burst(sim: &SimWorld, count: usize, node: NodeRef) -> SimulationResult<Vec<Request>> {
    let ctx = sim.context();
    sim.block_on(async move { generate_burst(&ctx, count, submit_request, node).await })?
}
