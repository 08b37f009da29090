//! Concurrency limiting.

use std::{cell::Cell, rc::Rc};

use async_trait::async_trait;

use crate::{
    error::{SimulatedError, SimulationResult},
    node::{Node, NodeRef},
    request::Request,
    sim::SimContext,
};

/// Admits at most `limit` concurrent requests into `inner`.
///
/// A request arriving while `limit` are in flight fails immediately with
/// [`SimulatedError::Rejected`], without consuming any time.
pub struct LimitConn {
    limit: usize,
    in_flight: Cell<usize>,
    peak: Cell<usize>,
    rejected: Cell<u64>,
    inner: NodeRef,
}

impl LimitConn {
    /// Requests currently inside `inner`.
    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    /// Highest in-flight count observed.
    pub fn peak(&self) -> usize {
        self.peak.get()
    }

    /// Requests turned away so far.
    pub fn rejected(&self) -> u64 {
        self.rejected.get()
    }
}

#[async_trait(?Send)]
impl Node for LimitConn {
    async fn process(&self, ctx: &SimContext, req: Request) -> SimulationResult<Request> {
        let current = self.in_flight.get();
        if current >= self.limit {
            self.rejected.set(self.rejected.get() + 1);
            tracing::trace!(request = %req.id, limit = self.limit, "rejected at limit");
            return Ok(req.fail(SimulatedError::Rejected));
        }

        self.in_flight.set(current + 1);
        self.peak.set(self.peak.get().max(current + 1));
        let result = self.inner.process(ctx, req).await;
        self.in_flight.set(self.in_flight.get() - 1);
        result
    }

    fn start(&self, ctx: &SimContext) -> SimulationResult<()> {
        self.inner.start(ctx)
    }

    fn describe(&self) -> String {
        format!("limit_conn({}, {})", self.limit, self.inner.describe())
    }
}

/// Caps the number of requests concurrently inside `inner` at `limit`.
pub fn limit_conn(limit: usize, inner: NodeRef) -> Rc<LimitConn> {
    Rc::new(LimitConn {
        limit,
        in_flight: Cell::new(0),
        peak: Cell::new(0),
        rejected: Cell::new(0),
        inner,
    })
}
