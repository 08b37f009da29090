//! Core SimWorld and WeakSimWorld types.
//!
//! `SimWorld` owns the clock, the event queue and every live task. It is the
//! only thing that polls tasks and the only thing that moves time forward.
//!
//! ## Run loop
//!
//! ```text
//!            ┌──────────────────────────┐
//!            │ poll ready tasks until   │◄─────────────┐
//!            │ the ready queue is empty │              │
//!            └────────────┬─────────────┘              │
//!                         │                            │
//!        foreground tasks │ and foreground events      │
//!        both zero? ──────┼──────► quiescent, return   │
//!                         │                            │
//!        foreground event │ pending?                   │
//!                         ├──────► jump to the earliest│
//!                         │        instant, wake every │
//!                         │        task due at it ─────┘
//!                         │
//!                         └──────► stall watchdog ─► SchedulerStalled
//! ```
//!
//! Tasks released at the same instant are queued in registration order; they
//! all run before the clock may move again.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    future::Future,
    rc::{Rc, Weak},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll, Waker},
    time::{Duration, Instant},
};

use tokio::sync::oneshot;
use tracing::instrument;

use crate::{
    config::SchedulerConfiguration,
    error::{SimulationError, SimulationResult},
    sim::{
        events::{Event, EventQueue, ScheduledEvent},
        metrics::SimulationMetrics,
        rng::{reset_sim_rng, set_sim_seed},
        sleep::SleepFuture,
        task::{BoxedTask, JoinHandle, ReadyQueue, TaskId, TaskSlot, TaskState, TaskWaker},
        watchdog::StallWatchdog,
    },
};

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(0);

/// A registered sleep waiting for its wake event.
#[derive(Debug)]
struct Sleeper {
    until: Duration,
    waker: Option<Waker>,
    fired: bool,
}

/// Internal simulation state holder
#[derive(Debug)]
struct SimInner {
    config: SchedulerConfiguration,
    /// Unique per process; epochs restart in every world.
    world_id: u64,
    /// Set by the first `reset()`.
    armed: bool,
    epoch: u64,

    current_time: Duration,
    event_queue: EventQueue,
    next_sequence: u64,
    /// Pending wake events owned by foreground tasks.
    foreground_events: usize,

    tasks: BTreeMap<TaskId, TaskSlot>,
    next_task_id: u64,
    foreground_tasks: usize,
    /// The task being polled, if any.
    current_task: Option<TaskId>,
    ready: Arc<ReadyQueue>,

    sleepers: HashMap<u64, Sleeper>,
    next_sleep_token: u64,

    next_request_id: u64,

    events_processed: u64,
    tasks_spawned: u64,
    polls: u64,
}

impl SimInner {
    fn new(config: SchedulerConfiguration) -> Self {
        Self {
            config,
            world_id: NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed),
            armed: false,
            epoch: 0,
            current_time: Duration::ZERO,
            event_queue: EventQueue::new(),
            next_sequence: 0,
            foreground_events: 0,
            tasks: BTreeMap::new(),
            next_task_id: 0,
            foreground_tasks: 0,
            current_task: None,
            ready: Arc::new(ReadyQueue::default()),
            sleepers: HashMap::new(),
            next_sleep_token: 0,
            next_request_id: 0,
            events_processed: 0,
            tasks_spawned: 0,
            polls: 0,
        }
    }

    fn ensure_armed(&self) -> SimulationResult<()> {
        if self.armed {
            Ok(())
        } else {
            Err(SimulationError::InvalidState(
                "scheduler used before reset()".to_string(),
            ))
        }
    }
}

/// The central simulation coordinator that manages time, tasks and events.
///
/// `SimWorld` is a cheap, clonable handle (`Rc`) over the shared state. Task
/// bodies and nodes should hold a [`WeakSimWorld`] (usually through a
/// [`crate::SimContext`]) so that dropping the world tears everything down.
#[derive(Debug, Clone)]
pub struct SimWorld {
    inner: Rc<RefCell<SimInner>>,
}

impl SimWorld {
    /// Creates a world with the default configuration (seed 0).
    ///
    /// The world must be [`reset`](Self::reset) before use.
    pub fn new() -> Self {
        Self::new_with_config(SchedulerConfiguration::default())
    }

    /// Creates a world whose RNG is seeded with `seed`.
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new_with_config(SchedulerConfiguration::with_seed(seed))
    }

    /// Creates a world from an explicit configuration.
    ///
    /// Resets the thread-local RNG before installing the configured seed, so
    /// consecutive worlds on the same thread start from identical state.
    pub fn new_with_config(config: SchedulerConfiguration) -> Self {
        reset_sim_rng();
        set_sim_seed(config.seed);

        Self {
            inner: Rc::new(RefCell::new(SimInner::new(config))),
        }
    }

    /// Creates a weak reference to this simulation world.
    pub fn downgrade(&self) -> WeakSimWorld {
        WeakSimWorld {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns a context handle for tasks and nodes.
    pub fn context(&self) -> crate::SimContext {
        crate::SimContext::new(self.downgrade())
    }

    /// Returns the configuration this world was built with.
    pub fn config(&self) -> SchedulerConfiguration {
        self.inner.borrow().config.clone()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Clears pending events and daemon tasks and sets the clock to zero.
    ///
    /// Fails with `InvalidState` while any foreground task is alive or when
    /// called from inside a task. Each successful reset starts a new epoch.
    #[instrument(skip(self))]
    pub fn reset(&self) -> SimulationResult<()> {
        let dropped = {
            let mut inner = self.inner.borrow_mut();
            if inner.current_task.is_some() {
                return Err(SimulationError::InvalidState(
                    "reset() called from inside a task".to_string(),
                ));
            }
            if inner.foreground_tasks > 0 {
                return Err(SimulationError::InvalidState(format!(
                    "reset() with {} active task(s)",
                    inner.foreground_tasks
                )));
            }

            inner.armed = true;
            inner.epoch += 1;
            inner.current_time = Duration::ZERO;
            inner.event_queue.clear();
            inner.foreground_events = 0;
            inner.sleepers.clear();
            inner.next_request_id = 0;
            inner.ready.clear();
            tracing::debug!(
                epoch = inner.epoch,
                daemons = inner.tasks.len(),
                "simulation reset"
            );
            std::mem::take(&mut inner.tasks)
        };
        // Daemon futures may hold sleeps that call back into the world on drop.
        drop(dropped);
        Ok(())
    }

    /// Number of successful resets so far.
    pub fn epoch(&self) -> u64 {
        self.inner.borrow().epoch
    }

    /// Identifier distinguishing this world from every other world created
    /// in the process.
    pub fn world_id(&self) -> u64 {
        self.inner.borrow().world_id
    }

    // =========================================================================
    // Time
    // =========================================================================

    /// Returns the current simulation time.
    pub fn current_time(&self) -> Duration {
        self.inner.borrow().current_time
    }

    /// Returns `true` if there are events waiting to be processed.
    pub fn has_pending_events(&self) -> bool {
        !self.inner.borrow().event_queue.is_empty()
    }

    /// Returns the number of events waiting to be processed.
    pub fn pending_event_count(&self) -> usize {
        self.inner.borrow().event_queue.len()
    }

    /// Suspends the calling task for `duration` of virtual time.
    ///
    /// Must be called from inside a running task. The returned future resolves
    /// when the clock reaches `current_time() + duration`, never earlier.
    /// Fails with `InvalidArgument` if that instant is not representable.
    pub fn sleep(&self, duration: Duration) -> SimulationResult<SleepFuture> {
        let mut inner = self.inner.borrow_mut();
        inner.ensure_armed()?;
        let task_id = inner.current_task.ok_or_else(|| {
            SimulationError::InvalidState("sleep() called outside of a task".to_string())
        })?;
        let daemon = inner.tasks.get(&task_id).is_some_and(|slot| slot.daemon);

        let until = inner.current_time.checked_add(duration).ok_or_else(|| {
            SimulationError::InvalidArgument(format!(
                "sleep of {duration:?} overflows the clock at {:?}",
                inner.current_time
            ))
        })?;
        let token = inner.next_sleep_token;
        inner.next_sleep_token += 1;
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        inner.event_queue.schedule(ScheduledEvent::new(
            until,
            Event::Wake {
                task_id,
                token,
                daemon,
            },
            sequence,
        ));
        if !daemon {
            inner.foreground_events += 1;
        }
        inner.sleepers.insert(
            token,
            Sleeper {
                until,
                waker: None,
                fired: false,
            },
        );
        tracing::trace!(%task_id, ?until, "sleep registered");

        drop(inner);
        Ok(SleepFuture::new(self.downgrade(), token, until))
    }

    /// Millisecond entry point for [`sleep`](Self::sleep).
    ///
    /// Fails with `InvalidArgument` if `ms` is negative, NaN or infinite.
    pub fn sleep_ms(&self, ms: f64) -> SimulationResult<SleepFuture> {
        self.sleep(duration_from_ms(ms)?)
    }

    pub(crate) fn poll_sleep(&self, token: u64, waker: &Waker) -> Poll<SimulationResult<()>> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let Some(sleeper) = inner.sleepers.get_mut(&token) else {
            return Poll::Ready(Err(SimulationError::InvalidState(
                "sleep registration lost across reset()".to_string(),
            )));
        };

        if sleeper.fired {
            inner.sleepers.remove(&token);
            return Poll::Ready(Ok(()));
        }

        sleeper.waker = Some(waker.clone());
        let until = sleeper.until;
        if let Some(slot) = inner
            .current_task
            .and_then(|task_id| inner.tasks.get_mut(&task_id))
        {
            slot.state = TaskState::Sleeping { until };
        }
        Poll::Pending
    }

    pub(crate) fn forget_sleep(&self, token: u64) {
        // A sleep dropped while the world is mutably borrowed (reset tearing
        // down daemons) has already been cleared.
        if let Ok(mut inner) = self.inner.try_borrow_mut() {
            inner.sleepers.remove(&token);
        }
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Spawns a foreground task starting at the current instant.
    ///
    /// Foreground tasks keep the simulation alive until they complete.
    #[instrument(skip(self, future))]
    pub fn spawn<F, T>(&self, future: F) -> SimulationResult<JoinHandle<T>>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let body = async move {
            let output = future.await;
            // The handle may have been dropped; the output is then discarded.
            let _ = sender.send(output);
        };
        let task_id = self.register_task(Box::pin(body), false)?;
        Ok(JoinHandle::new(task_id, receiver))
    }

    /// Spawns a background task that does not count toward quiescence.
    ///
    /// Daemon tasks and their pending wake events are dropped by `reset()`.
    pub fn spawn_daemon<F>(&self, future: F) -> SimulationResult<TaskId>
    where
        F: Future<Output = ()> + 'static,
    {
        self.register_task(Box::pin(future), true)
    }

    fn register_task(&self, future: BoxedTask, daemon: bool) -> SimulationResult<TaskId> {
        let mut inner = self.inner.borrow_mut();
        inner.ensure_armed()?;

        let task_id = TaskId(inner.next_task_id);
        inner.next_task_id += 1;
        let waker = Waker::from(Arc::new(TaskWaker {
            task_id,
            ready: inner.ready.clone(),
        }));
        inner
            .tasks
            .insert(task_id, TaskSlot::new(future, daemon, waker));
        if !daemon {
            inner.foreground_tasks += 1;
        }
        inner.tasks_spawned += 1;
        inner.ready.push(task_id);
        tracing::trace!(%task_id, daemon, at = ?inner.current_time, "task spawned");
        Ok(task_id)
    }

    /// Returns the state of a task, or `None` for an id never handed out.
    pub fn task_state(&self, task_id: TaskId) -> Option<TaskState> {
        let inner = self.inner.borrow();
        match inner.tasks.get(&task_id) {
            Some(slot) => Some(slot.state),
            None if task_id.0 < inner.next_task_id => Some(TaskState::Completed),
            None => None,
        }
    }

    /// Number of foreground tasks that have not completed.
    pub fn active_task_count(&self) -> usize {
        self.inner.borrow().foreground_tasks
    }

    /// Number of live daemon tasks.
    pub fn daemon_task_count(&self) -> usize {
        self.inner
            .borrow()
            .tasks
            .values()
            .filter(|slot| slot.daemon)
            .count()
    }

    /// Returns `true` when no foreground task is alive and no foreground
    /// event is pending.
    pub fn is_quiescent(&self) -> bool {
        let inner = self.inner.borrow();
        inner.foreground_tasks == 0 && inner.foreground_events == 0
    }

    /// Polls one task. Returns `false` if the id no longer names a live task.
    fn poll_task(&self, task_id: TaskId) -> bool {
        let (mut future, waker) = {
            let mut inner = self.inner.borrow_mut();
            let Some(slot) = inner.tasks.get_mut(&task_id) else {
                return false;
            };
            let Some(future) = slot.future.take() else {
                return false;
            };
            slot.state = TaskState::Runnable;
            let waker = slot.waker.clone();
            inner.current_task = Some(task_id);
            inner.polls += 1;
            (future, waker)
        };

        let mut cx = Context::from_waker(&waker);
        let result = future.as_mut().poll(&mut cx);

        let finished = {
            let mut inner = self.inner.borrow_mut();
            inner.current_task = None;
            match result {
                Poll::Ready(()) => {
                    if let Some(slot) = inner.tasks.remove(&task_id) {
                        if !slot.daemon {
                            inner.foreground_tasks -= 1;
                        }
                    }
                    tracing::trace!(%task_id, at = ?inner.current_time, "task completed");
                    Some(future)
                }
                Poll::Pending => {
                    if let Some(slot) = inner.tasks.get_mut(&task_id) {
                        if slot.state == TaskState::Runnable {
                            slot.state = TaskState::Parked;
                        }
                        slot.future = Some(future);
                    }
                    None
                }
            }
        };
        // Dropping a finished future can run destructors that touch the world.
        drop(finished);
        true
    }

    /// Polls runnable tasks until none is left. Returns the number of polls.
    pub fn run_until_idle(&self) -> u64 {
        let ready = self.inner.borrow().ready.clone();
        let mut polled = 0;
        while let Some(task_id) = ready.pop() {
            if self.poll_task(task_id) {
                polled += 1;
            }
        }
        polled
    }

    // =========================================================================
    // Event processing
    // =========================================================================

    /// Advances the clock to the earliest pending instant and releases every
    /// task registered for it.
    ///
    /// Returns `Ok(false)` when no event is pending. Released tasks are only
    /// queued; they run on the next [`run_until_idle`](Self::run_until_idle).
    #[instrument(skip(self))]
    pub fn step(&self) -> SimulationResult<bool> {
        let wakers = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            inner.ensure_armed()?;
            let Some(next_time) = inner.event_queue.peek_earliest().map(ScheduledEvent::time)
            else {
                return Ok(false);
            };
            if next_time < inner.current_time {
                return Err(SimulationError::InvalidState(format!(
                    "event at {next_time:?} is before current time {:?}",
                    inner.current_time
                )));
            }
            if next_time > inner.current_time {
                tracing::trace!(from = ?inner.current_time, to = ?next_time, "advancing clock");
            }
            inner.current_time = next_time;

            let due = inner.event_queue.pop_all_at(next_time);
            let mut wakers = Vec::with_capacity(due.len());
            for scheduled in due {
                inner.events_processed += 1;
                match scheduled.into_event() {
                    Event::Wake { token, daemon, .. } => {
                        if !daemon {
                            inner.foreground_events -= 1;
                        }
                        if let Some(sleeper) = inner.sleepers.get_mut(&token) {
                            sleeper.fired = true;
                            if let Some(waker) = sleeper.waker.take() {
                                wakers.push(waker);
                            }
                        }
                    }
                }
            }
            wakers
        };

        for waker in wakers {
            waker.wake();
        }
        Ok(true)
    }

    /// Drives the simulation until it is quiescent.
    ///
    /// Alternates between polling every runnable task and jumping the clock to
    /// the next pending instant. Returns the run's metrics, or
    /// `SchedulerStalled` if foreground tasks remain blocked with nothing left
    /// to wake them.
    #[instrument(skip(self))]
    pub fn await_quiescence(&self) -> SimulationResult<SimulationMetrics> {
        let (start_time, start_events, start_spawned, start_polls, watchdog, ready) = {
            let inner = self.inner.borrow();
            inner.ensure_armed()?;
            if inner.current_task.is_some() {
                return Err(SimulationError::InvalidState(
                    "await_quiescence() called from inside a task".to_string(),
                ));
            }
            (
                inner.current_time,
                inner.events_processed,
                inner.tasks_spawned,
                inner.polls,
                StallWatchdog::new(inner.config.stall_timeout, inner.config.stall_poll_interval),
                inner.ready.clone(),
            )
        };
        let wall_start = Instant::now();

        loop {
            self.run_until_idle();

            let (foreground_tasks, foreground_events) = {
                let inner = self.inner.borrow();
                (inner.foreground_tasks, inner.foreground_events)
            };

            if foreground_tasks == 0 && foreground_events == 0 {
                break;
            }

            if foreground_events > 0 {
                self.step()?;
                continue;
            }

            tracing::warn!(
                blocked_tasks = foreground_tasks,
                at = ?self.current_time(),
                "no runnable task and no pending event, waiting for an external wake-up"
            );
            if !watchdog.wait_for_wakeup(&ready) {
                let at = self.current_time();
                tracing::error!(
                    blocked_tasks = foreground_tasks,
                    ?at,
                    "scheduler stalled"
                );
                return Err(SimulationError::SchedulerStalled {
                    blocked_tasks: foreground_tasks,
                    at,
                });
            }
        }

        let inner = self.inner.borrow();
        let metrics = SimulationMetrics {
            wall_time: wall_start.elapsed(),
            simulated_time: inner.current_time.saturating_sub(start_time),
            events_processed: inner.events_processed - start_events,
            tasks_spawned: inner.tasks_spawned - start_spawned,
            polls: inner.polls - start_polls,
        };
        tracing::debug!(?metrics, "simulation quiescent");
        Ok(metrics)
    }

    /// Spawns `future`, drives the world to quiescence and returns its output.
    pub fn block_on<F, T>(&self, future: F) -> SimulationResult<T>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        let mut handle = self.spawn(future)?;
        self.await_quiescence()?;
        handle.try_take()
    }

    /// Metrics accumulated since the world was created.
    pub fn extract_metrics(&self) -> SimulationMetrics {
        let inner = self.inner.borrow();
        SimulationMetrics {
            wall_time: Duration::ZERO,
            simulated_time: inner.current_time,
            events_processed: inner.events_processed,
            tasks_spawned: inner.tasks_spawned,
            polls: inner.polls,
        }
    }

    /// Hands out the next request id for the current epoch.
    pub(crate) fn next_request_id(&self) -> u64 {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_request_id;
        inner.next_request_id += 1;
        id
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a millisecond float into a `Duration`, rejecting negative,
/// NaN and infinite values.
pub(crate) fn duration_from_ms(ms: f64) -> SimulationResult<Duration> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(SimulationError::InvalidArgument(format!(
            "duration must be a finite, non-negative number of milliseconds, got {ms}"
        )));
    }
    Duration::try_from_secs_f64(ms / 1000.0)
        .map_err(|e| SimulationError::InvalidArgument(format!("duration {ms}ms: {e}")))
}

macro_rules! weak_forward {
    // For methods returning T that need Ok() wrapping
    (wrap $(#[$meta:meta])* $method:ident(&self $(, $arg:ident : $arg_ty:ty)*) -> $ret:ty) => {
        $(#[$meta])*
        pub fn $method(&self $(, $arg: $arg_ty)*) -> SimulationResult<$ret> {
            Ok(self.upgrade()?.$method($($arg),*))
        }
    };
    // For methods already returning SimulationResult
    (pass $(#[$meta:meta])* $method:ident(&self $(, $arg:ident : $arg_ty:ty)*) -> $ret:ty) => {
        $(#[$meta])*
        pub fn $method(&self $(, $arg: $arg_ty)*) -> SimulationResult<$ret> {
            self.upgrade()?.$method($($arg),*)
        }
    };
}

/// A weak reference to a simulation world.
///
/// All operations return `SimulationResult` and fail with
/// `SimulationShutdown` once the world has been dropped.
#[derive(Debug, Clone)]
pub struct WeakSimWorld {
    inner: Weak<RefCell<SimInner>>,
}

impl WeakSimWorld {
    /// Attempts to upgrade this weak reference to a strong reference.
    pub fn upgrade(&self) -> SimulationResult<SimWorld> {
        self.inner
            .upgrade()
            .map(|inner| SimWorld { inner })
            .ok_or(SimulationError::SimulationShutdown)
    }

    weak_forward!(wrap #[doc = "Returns the current simulation time."] current_time(&self) -> Duration);
    weak_forward!(wrap #[doc = "Number of successful resets so far."] epoch(&self) -> u64);
    weak_forward!(wrap #[doc = "Identifier of the world."] world_id(&self) -> u64);
    weak_forward!(pass #[doc = "Sleep for the specified duration in simulation time."] sleep(&self, duration: Duration) -> SleepFuture);
    weak_forward!(pass #[doc = "Sleep for a number of milliseconds in simulation time."] sleep_ms(&self, ms: f64) -> SleepFuture);

    /// Spawns a foreground task.
    pub fn spawn<F, T>(&self, future: F) -> SimulationResult<JoinHandle<T>>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        self.upgrade()?.spawn(future)
    }

    /// Spawns a daemon task.
    pub fn spawn_daemon<F>(&self, future: F) -> SimulationResult<TaskId>
    where
        F: Future<Output = ()> + 'static,
    {
        self.upgrade()?.spawn_daemon(future)
    }
}
