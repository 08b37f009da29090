//! Bounded retry of an inner node.

use std::rc::Rc;

use async_trait::async_trait;

use crate::{
    error::{SimulationError, SimulationResult},
    node::{Node, NodeRef},
    request::Request,
    sim::SimContext,
};

/// Re-submits a failed request to `inner`, at most `max_attempts` times in
/// total. Attempts follow each other back to back.
pub struct Retry {
    max_attempts: u32,
    inner: NodeRef,
}

impl Retry {
    /// Upper bound on attempts per request.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[async_trait(?Send)]
impl Node for Retry {
    async fn process(&self, ctx: &SimContext, req: Request) -> SimulationResult<Request> {
        let mut req = req;
        for attempt in 1..=self.max_attempts {
            req.attempts += 1;
            req = self.inner.process(ctx, req).await?;
            if !req.is_error() {
                break;
            }
            tracing::trace!(request = %req.id, attempt, error = ?req.error(), "attempt failed");
        }
        Ok(req)
    }

    fn start(&self, ctx: &SimContext) -> SimulationResult<()> {
        self.inner.start(ctx)
    }

    fn describe(&self) -> String {
        format!("retry({}, {})", self.max_attempts, self.inner.describe())
    }
}

/// Wraps `inner` so that each request is tried up to `max_attempts` times.
pub fn retry(max_attempts: u32, inner: NodeRef) -> SimulationResult<Rc<Retry>> {
    if max_attempts == 0 {
        return Err(SimulationError::InvalidArgument(
            "retry needs at least one attempt".to_string(),
        ));
    }
    Ok(Rc::new(Retry {
        max_attempts,
        inner,
    }))
}
