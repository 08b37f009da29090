use std::time::Duration;

use toposim::{
    nodes::{cable, cable_asymmetric, delay_exponential, delay_fixed, delay_uniform, server},
    run_burst, LatencySummary,
};

use super::{armed_world, run_one};

#[test]
fn test_server_is_instantaneous() {
    let sim = armed_world(0);
    let req = run_one(&sim, server("x"));
    assert_eq!(req.served_by(), Some("x"));
    assert_eq!(req.latency(), Some(Duration::ZERO));
    assert_eq!(req.attempts, 0);
}

#[test]
fn test_delay_fixed_latency() {
    let sim = armed_world(0);
    let req = run_one(&sim, delay_fixed(20.0, server("x")).unwrap());
    assert_eq!(req.latency(), Some(Duration::from_millis(20)));
    assert_eq!(req.served_by(), Some("x"));
}

#[test]
fn test_cable_applies_latency_both_ways() {
    let sim = armed_world(0);
    let req = run_one(
        &sim,
        cable(5.0, delay_fixed(10.0, server("x")).unwrap()).unwrap(),
    );
    assert_eq!(req.latency(), Some(Duration::from_millis(20)));

    sim.reset().unwrap();
    let req = run_one(&sim, cable_asymmetric(2.0, 7.0, server("x")).unwrap());
    assert_eq!(req.latency(), Some(Duration::from_millis(9)));
}

#[test]
fn test_delay_exponential_mean() {
    let sim = armed_world(3);
    let requests = run_burst(&sim, 4000, delay_exponential(100.0, server("x")).unwrap()).unwrap();
    let summary = LatencySummary::from_requests(&requests).unwrap();

    let mean_ms = summary.mean.as_secs_f64() * 1000.0;
    assert!((mean_ms - 100.0).abs() < 8.0, "mean was {mean_ms}ms");
    // Median of Exponential(100) is 100 * ln 2.
    let median_ms = summary.median.as_secs_f64() * 1000.0;
    assert!((median_ms - 69.3).abs() < 8.0, "median was {median_ms}ms");
}

#[test]
fn test_delay_uniform_stays_in_bounds() {
    let sim = armed_world(5);
    let requests = run_burst(&sim, 500, delay_uniform(10.0, 30.0, server("x")).unwrap()).unwrap();
    for req in &requests {
        let latency = req.latency().unwrap();
        assert!(latency >= Duration::from_millis(10) && latency < Duration::from_millis(30));
    }

    sim.reset().unwrap();
    let req = run_one(&sim, delay_uniform(4.0, 4.0, server("x")).unwrap());
    assert_eq!(req.latency(), Some(Duration::from_millis(4)));
}
