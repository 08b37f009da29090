//! Latency and throughput summaries over completed requests.

use std::{ops::Range, time::Duration};

use crate::request::Request;

/// `end_time - start_time` of a completed request.
pub fn latency(req: &Request) -> Option<Duration> {
    req.latency()
}

/// Returns `true` if the request ended in an error outcome.
pub fn is_error(req: &Request) -> bool {
    req.is_error()
}

/// Arrivals per second of virtual time whose start lies in `window`.
pub fn request_rate(reqs: &[Request], window: Range<Duration>) -> f64 {
    per_second(
        reqs.iter().filter(|r| window.contains(&r.start_time)).count(),
        &window,
    )
}

/// Completions per second of virtual time whose end lies in `window`.
pub fn response_rate(reqs: &[Request], window: Range<Duration>) -> f64 {
    per_second(
        reqs.iter()
            .filter(|r| r.end_time.is_some_and(|end| window.contains(&end)))
            .count(),
        &window,
    )
}

fn per_second(count: usize, window: &Range<Duration>) -> f64 {
    let span = window.end.saturating_sub(window.start);
    if span.is_zero() {
        return 0.0;
    }
    count as f64 / span.as_secs_f64()
}

/// Fraction of requests with an error outcome; 0 for an empty slice.
pub fn error_rate(reqs: &[Request]) -> f64 {
    if reqs.is_empty() {
        return 0.0;
    }
    reqs.iter().filter(|r| r.is_error()).count() as f64 / reqs.len() as f64
}

/// Nearest-rank quantile of `sorted`, which must be in ascending order.
///
/// `q` is clamped to `[0, 1]`. Returns `None` for an empty slice.
pub fn quantile(sorted: &[Duration], q: f64) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let q = if q.is_nan() { 0.0 } else { q.clamp(0.0, 1.0) };
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted.get(rank.saturating_sub(1)).copied()
}

/// Latency distribution of a set of completed requests.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
    /// Completed requests considered.
    pub count: usize,
    /// How many of them failed.
    pub errors: usize,
    /// Smallest latency.
    pub min: Duration,
    /// 50th percentile.
    pub median: Duration,
    /// 99th percentile.
    pub p99: Duration,
    /// Largest latency.
    pub max: Duration,
    /// Arithmetic mean.
    pub mean: Duration,
}

impl LatencySummary {
    /// Summarises every request that has an end time; `None` if there is none.
    pub fn from_requests(reqs: &[Request]) -> Option<Self> {
        let mut latencies: Vec<Duration> = reqs.iter().filter_map(Request::latency).collect();
        if latencies.is_empty() {
            return None;
        }
        latencies.sort_unstable();

        let count = latencies.len();
        let max = latencies[count - 1];
        let total_secs: f64 = latencies.iter().map(Duration::as_secs_f64).sum();
        let mean = Duration::try_from_secs_f64(total_secs / count as f64).unwrap_or(max);
        Some(Self {
            count,
            errors: reqs
                .iter()
                .filter(|r| r.end_time.is_some() && r.is_error())
                .count(),
            min: latencies[0],
            median: quantile(&latencies, 0.5)?,
            p99: quantile(&latencies, 0.99)?,
            max,
            mean,
        })
    }
}
