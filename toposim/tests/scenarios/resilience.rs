use toposim::{
    nodes::{cable, delay_fixed, faulty, lb_min_conn, pool, retry, server},
    run_poisson, stats, Node, NodeRef, SimulationResult,
};

use super::armed_world;

fn faulty_worker(i: usize) -> SimulationResult<NodeRef> {
    Ok(faulty(500.0, 100.0, delay_fixed(5.0, server(format!("s{i}")))?)? as NodeRef)
}

#[test]
fn test_retry_over_balanced_pool_masks_faults() {
    let sim = armed_world(31);
    let single = run_poisson(&sim, 3000, 10.0, faulty_worker(0).unwrap()).unwrap();
    let single_errors = stats::error_rate(&single);
    assert!(single_errors > 0.05, "single worker error rate {single_errors}");

    sim.reset().unwrap();
    let top = cable(
        1.0,
        retry(3, lb_min_conn(pool(3, faulty_worker).unwrap(), Some(50.0)).unwrap()).unwrap(),
    )
    .unwrap();
    let resilient = run_poisson(&sim, 3000, 10.0, top).unwrap();
    let resilient_errors = stats::error_rate(&resilient);

    assert!(
        resilient_errors < single_errors / 2.0,
        "resilient {resilient_errors} vs single {single_errors}"
    );
    assert!(resilient.iter().all(|r| r.attempts >= 1 && r.attempts <= 3));
}

#[test]
fn test_describe_renders_topology() {
    let top = cable(
        1.0,
        retry(3, lb_min_conn(pool(3, faulty_worker).unwrap(), Some(50.0)).unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(
        top.describe(),
        "cable(1, retry(3, lb_min_conn[hold=50ms](pool(3, \
         faulty(500, 100, delay_fixed(5, server(s0)))))))"
    );
}
