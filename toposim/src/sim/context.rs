//! Context handed to tasks and nodes.

use std::{future::Future, time::Duration};

use crate::{
    error::SimulationResult,
    request::{Request, RequestId},
    sim::{
        task::{JoinHandle, TaskId},
        world::{duration_from_ms, WeakSimWorld},
    },
};

/// Handle through which tasks and nodes reach the scheduler.
///
/// Holds only a weak reference, so a context captured by a long-lived task
/// never keeps a dropped world alive.
#[derive(Debug, Clone)]
pub struct SimContext {
    sim: WeakSimWorld,
}

impl SimContext {
    /// Wrap a weak world reference.
    pub fn new(sim: WeakSimWorld) -> Self {
        Self { sim }
    }

    /// The underlying world handle.
    pub fn world(&self) -> &WeakSimWorld {
        &self.sim
    }

    /// Current virtual time.
    pub fn now(&self) -> SimulationResult<Duration> {
        self.sim.current_time()
    }

    /// Current reset epoch of the world.
    pub fn epoch(&self) -> SimulationResult<u64> {
        self.sim.epoch()
    }

    /// Identifier of the world this context belongs to.
    pub fn world_id(&self) -> SimulationResult<u64> {
        self.sim.world_id()
    }

    /// Suspend the calling task for `duration` of virtual time.
    pub async fn sleep(&self, duration: Duration) -> SimulationResult<()> {
        self.sim.sleep(duration)?.await
    }

    /// Suspend the calling task for `ms` milliseconds of virtual time.
    pub async fn sleep_ms(&self, ms: f64) -> SimulationResult<()> {
        self.sleep(duration_from_ms(ms)?).await
    }

    /// Spawn a foreground task.
    pub fn spawn<F, T>(&self, future: F) -> SimulationResult<JoinHandle<T>>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        self.sim.spawn(future)
    }

    /// Spawn a daemon task.
    pub fn spawn_daemon<F>(&self, future: F) -> SimulationResult<TaskId>
    where
        F: Future<Output = ()> + 'static,
    {
        self.sim.spawn_daemon(future)
    }

    /// Create a request stamped with the current time and a fresh id.
    pub fn new_request(&self) -> SimulationResult<Request> {
        let sim = self.sim.upgrade()?;
        let id = RequestId(sim.next_request_id());
        Ok(Request::new(id, sim.current_time()))
    }
}
