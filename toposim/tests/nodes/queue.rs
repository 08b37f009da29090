use std::time::Duration;

use toposim::{
    nodes::{delay_exponential, delay_fixed, queue_exclusive, server},
    run_burst, run_poisson,
};

use super::armed_world;

#[test]
fn test_burst_is_served_one_at_a_time() {
    let sim = armed_world(0);
    let queue = queue_exclusive(delay_fixed(10.0, server("x")).unwrap());
    let requests = run_burst(&sim, 5, queue.clone()).unwrap();

    let latencies: Vec<Duration> = requests.iter().map(|r| r.latency().unwrap()).collect();
    assert_eq!(
        latencies,
        (1..=5)
            .map(|i| Duration::from_millis(10 * i))
            .collect::<Vec<_>>()
    );
    assert_eq!(queue.queue_len(), 0);
    assert!(!queue.is_busy());
}

#[test]
fn test_completion_follows_arrival_order() {
    let sim = armed_world(11);
    let requests = run_poisson(
        &sim,
        1000,
        60.0,
        queue_exclusive(delay_exponential(50.0, server("x")).unwrap()),
    )
    .unwrap();

    assert!(requests.windows(2).all(|w| w[0].id < w[1].id));
    assert!(requests.windows(2).all(|w| w[0].start_time <= w[1].start_time));
    for pair in requests.windows(2) {
        assert!(
            pair[0].end_time.unwrap() <= pair[1].end_time.unwrap(),
            "{} finished after {}",
            pair[0].id,
            pair[1].id
        );
    }
}
