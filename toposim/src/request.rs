use std::{fmt, time::Duration};

use crate::error::SimulatedError;

/// Unique, monotonically increasing request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Terminal result of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Served successfully by the server with this label.
    Success(String),
    /// Failed inside the simulated topology.
    Error(SimulatedError),
}

impl Outcome {
    /// Returns `true` for [`Outcome::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }
}

/// One unit of work travelling through a topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Unique id within the current epoch.
    pub id: RequestId,
    /// Clock reading when the request was created.
    pub start_time: Duration,
    /// Clock reading when the entry node returned; unset until then.
    pub end_time: Option<Duration>,
    /// Unset until some node decides the request's fate.
    pub outcome: Option<Outcome>,
    /// Times a `retry` wrapper handed this request to its inner node.
    pub attempts: u32,
}

impl Request {
    /// Creates a request that started at `start_time`.
    pub fn new(id: RequestId, start_time: Duration) -> Self {
        Self {
            id,
            start_time,
            end_time: None,
            outcome: None,
            attempts: 0,
        }
    }

    /// Marks the request as served by `label`.
    pub fn succeed(mut self, label: impl Into<String>) -> Self {
        self.outcome = Some(Outcome::Success(label.into()));
        self
    }

    /// Marks the request as failed with `error`.
    pub fn fail(mut self, error: SimulatedError) -> Self {
        self.outcome = Some(Outcome::Error(error));
        self
    }

    /// `end_time - start_time`, once the request has completed.
    pub fn latency(&self) -> Option<Duration> {
        self.end_time
            .map(|end| end.saturating_sub(self.start_time))
    }

    /// Returns `true` if the outcome is an error.
    pub fn is_error(&self) -> bool {
        self.outcome.as_ref().is_some_and(Outcome::is_error)
    }

    /// Returns `true` if the outcome is a success.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Some(Outcome::Success(_)))
    }

    /// The simulated error, if the request failed.
    pub fn error(&self) -> Option<&SimulatedError> {
        match &self.outcome {
            Some(Outcome::Error(e)) => Some(e),
            _ => None,
        }
    }

    /// Label of the server that handled the request, if it succeeded.
    pub fn served_by(&self) -> Option<&str> {
        match &self.outcome {
            Some(Outcome::Success(label)) => Some(label),
            _ => None,
        }
    }
}
