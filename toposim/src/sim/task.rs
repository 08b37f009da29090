//! Tasks: the execution units the scheduler drives.
//!
//! A task is a boxed, `!Send` future owned by the [`crate::SimWorld`]. It is
//! polled only by the world's run loop; its waker pushes it back onto a shared
//! ready queue. The scheduler never advances the clock while that queue is
//! non-empty.

use std::{
    collections::{HashSet, VecDeque},
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, PoisonError},
    task::{Context, Poll, Wake, Waker},
    time::Duration,
};

use tokio::sync::oneshot;

use crate::error::{SimulationError, SimulationResult};

/// Unique identifier of a task within one world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle of a task as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Queued for polling at the current instant.
    Runnable,
    /// Suspended in `sleep` until the clock reaches `until`.
    Sleeping {
        /// Wake time registered with the event queue.
        until: Duration,
    },
    /// Pending on something other than the clock (a node-local queue, a join).
    Parked,
    /// The body returned.
    Completed,
}

pub(crate) type BoxedTask = Pin<Box<dyn Future<Output = ()>>>;

/// Scheduler-side record of a live task.
pub(crate) struct TaskSlot {
    /// `None` while the future is being polled.
    pub(crate) future: Option<BoxedTask>,
    pub(crate) state: TaskState,
    pub(crate) daemon: bool,
    pub(crate) waker: Waker,
}

impl TaskSlot {
    pub(crate) fn new(future: BoxedTask, daemon: bool, waker: Waker) -> Self {
        Self {
            future: Some(future),
            state: TaskState::Runnable,
            daemon,
            waker,
        }
    }
}

impl fmt::Debug for TaskSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSlot")
            .field("state", &self.state)
            .field("daemon", &self.daemon)
            .field("polling", &self.future.is_none())
            .finish()
    }
}

#[derive(Debug, Default)]
struct ReadyState {
    queue: VecDeque<TaskId>,
    queued: HashSet<TaskId>,
}

/// FIFO of tasks that must be polled before time may advance.
///
/// Shared with every [`TaskWaker`]; wakers must be `Send + Sync`, hence the
/// mutex even though the world itself is single-threaded.
#[derive(Debug, Default)]
pub(crate) struct ReadyQueue {
    state: Mutex<ReadyState>,
}

impl ReadyQueue {
    /// Enqueue `task_id` unless it is already waiting to be polled.
    pub(crate) fn push(&self, task_id: TaskId) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.queued.insert(task_id) {
            state.queue.push_back(task_id);
        }
    }

    pub(crate) fn pop(&self) -> Option<TaskId> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let task_id = state.queue.pop_front()?;
        state.queued.remove(&task_id);
        Some(task_id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .queue
            .is_empty()
    }

    pub(crate) fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.queue.clear();
        state.queued.clear();
    }
}

/// Waker that reschedules a task on the world's ready queue.
pub(crate) struct TaskWaker {
    pub(crate) task_id: TaskId,
    pub(crate) ready: Arc<ReadyQueue>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.ready.push(self.task_id);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.ready.push(self.task_id);
    }
}

/// Handle to the output of a spawned task.
///
/// Await it from another task, or call [`JoinHandle::try_take`] from the
/// harness once the world is quiescent.
#[derive(Debug)]
pub struct JoinHandle<T> {
    task_id: TaskId,
    receiver: oneshot::Receiver<T>,
}

impl<T> JoinHandle<T> {
    pub(crate) fn new(task_id: TaskId, receiver: oneshot::Receiver<T>) -> Self {
        Self { task_id, receiver }
    }

    /// The id of the task backing this handle.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Take the task's output if it has completed.
    ///
    /// Returns `InvalidState` while the task is still running and
    /// `SimulationShutdown` if it was dropped without completing.
    pub fn try_take(&mut self) -> SimulationResult<T> {
        self.receiver.try_recv().map_err(|e| match e {
            oneshot::error::TryRecvError::Empty => {
                SimulationError::InvalidState(format!("{} has not completed", self.task_id))
            }
            oneshot::error::TryRecvError::Closed => SimulationError::SimulationShutdown,
        })
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = SimulationResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map_err(|_| SimulationError::SimulationShutdown)
    }
}
