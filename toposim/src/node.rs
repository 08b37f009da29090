//! The uniform processing contract every pipeline stage implements.

use std::rc::Rc;

use async_trait::async_trait;

use crate::{error::SimulationResult, request::Request, sim::SimContext};

/// A composable pipeline stage.
///
/// `process` may sleep any number of times and may read or mutate the node's
/// private state, but it must always return with an outcome set; it never
/// leaves its caller blocked indefinitely. A returned `Err` is a host fault
/// (scheduler misuse, invalid argument) and aborts the run. Simulated
/// failures are expressed through [`Request::fail`].
#[async_trait(?Send)]
pub trait Node {
    /// Run `req` through this stage.
    async fn process(&self, ctx: &SimContext, req: Request) -> SimulationResult<Request>;

    /// Install background activity for the current epoch.
    ///
    /// Called by [`submit`] before every submission; implementations recurse
    /// into their children and must be idempotent within an epoch.
    fn start(&self, _ctx: &SimContext) -> SimulationResult<()> {
        Ok(())
    }

    /// Textual form of the subtree rooted at this node.
    fn describe(&self) -> String;
}

/// Shared handle to a node.
pub type NodeRef = Rc<dyn Node>;

/// Runs `req` through `node` and stamps its end time.
pub async fn submit(ctx: &SimContext, node: &NodeRef, req: Request) -> SimulationResult<Request> {
    node.start(ctx)?;
    let id = req.id;
    let mut req = node.process(ctx, req).await?;
    req.end_time = Some(ctx.now()?);
    tracing::trace!(
        request = %id,
        latency = ?req.latency(),
        outcome = ?req.outcome,
        "request completed"
    );
    Ok(req)
}
