//! Single-server FIFO queue.

use std::{cell::Cell, rc::Rc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    error::SimulationResult,
    node::{Node, NodeRef},
    request::Request,
    sim::SimContext,
};

/// Admits one request at a time into `inner`; the rest wait in arrival order.
///
/// The gate is a fair mutex: waiters acquire it strictly in the order they
/// started waiting, so a request is dispatched only after every earlier one
/// has left `inner`.
pub struct QueueExclusive {
    gate: Mutex<()>,
    waiting: Cell<usize>,
    inner: NodeRef,
}

impl QueueExclusive {
    /// Requests waiting for the gate.
    pub fn queue_len(&self) -> usize {
        self.waiting.get()
    }

    /// Returns `true` while a request is inside `inner`.
    pub fn is_busy(&self) -> bool {
        self.gate.try_lock().is_err()
    }
}

#[async_trait(?Send)]
impl Node for QueueExclusive {
    async fn process(&self, ctx: &SimContext, req: Request) -> SimulationResult<Request> {
        self.waiting.set(self.waiting.get() + 1);
        let _permit = self.gate.lock().await;
        self.waiting.set(self.waiting.get() - 1);
        tracing::trace!(request = %req.id, queued = self.waiting.get(), "dispatching from queue");
        self.inner.process(ctx, req).await
    }

    fn start(&self, ctx: &SimContext) -> SimulationResult<()> {
        self.inner.start(ctx)
    }

    fn describe(&self) -> String {
        format!("queue_exclusive({})", self.inner.describe())
    }
}

/// Wraps `inner` in an exclusive FIFO queue.
pub fn queue_exclusive(inner: NodeRef) -> Rc<QueueExclusive> {
    Rc::new(QueueExclusive {
        gate: Mutex::new(()),
        waiting: Cell::new(0),
        inner,
    })
}
