//! Event scheduling primitives.
//!
//! The queue is a min-heap keyed by `(time, sequence)`. Sequence numbers are
//! handed out at registration, so events sharing an instant pop in the order
//! they were registered.

use std::{cmp::Ordering, collections::BinaryHeap, time::Duration};

use super::task::TaskId;

/// Events that can be scheduled in the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Release a task parked in [`crate::SleepFuture`].
    Wake {
        /// The task that registered the sleep.
        task_id: TaskId,
        /// Identifies the sleep registration inside the world.
        token: u64,
        /// Daemon wakes do not keep the simulation alive.
        daemon: bool,
    },
}

impl Event {
    /// Returns `true` if this event belongs to a daemon task.
    pub fn is_daemon(&self) -> bool {
        match self {
            Event::Wake { daemon, .. } => *daemon,
        }
    }
}

/// An event scheduled for execution at a specific simulation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    time: Duration,
    event: Event,
    sequence: u64,
}

impl ScheduledEvent {
    /// Creates a new scheduled event.
    pub fn new(time: Duration, event: Event, sequence: u64) -> Self {
        Self {
            time,
            event,
            sequence,
        }
    }

    /// Returns the scheduled execution time.
    pub fn time(&self) -> Duration {
        self.time
    }

    /// Returns the registration sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns a reference to the event.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Consumes the scheduled event and returns the event.
    pub fn into_event(self) -> Event {
        self.event
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max heap; reverse both keys so the earliest
        // (time, sequence) pair sits on top.
        match other.time.cmp(&self.time) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            other => other,
        }
    }
}

/// A priority queue for scheduling events in chronological order.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<ScheduledEvent>,
}

impl EventQueue {
    /// Creates a new empty event queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    /// Schedules an event for execution.
    pub fn schedule(&mut self, event: ScheduledEvent) {
        self.heap.push(event);
    }

    /// Removes and returns the earliest scheduled event.
    pub fn pop_earliest(&mut self) -> Option<ScheduledEvent> {
        self.heap.pop()
    }

    /// Returns a reference to the earliest scheduled event without removing it.
    pub fn peek_earliest(&self) -> Option<&ScheduledEvent> {
        self.heap.peek()
    }

    /// Removes every event scheduled exactly at `time`, in sequence order.
    pub fn pop_all_at(&mut self, time: Duration) -> Vec<ScheduledEvent> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|e| e.time == time) {
            if let Some(event) = self.heap.pop() {
                due.push(event);
            }
        }
        due
    }

    /// Drops every pending event.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Returns `true` if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns the number of events in the queue.
    pub fn len(&self) -> usize {
        self.heap.len()
    }
}
