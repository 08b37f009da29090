use std::time::Duration;

use toposim::{
    nodes::{delay_fixed, limit_conn, server},
    run_burst, SimulatedError,
};

use super::armed_world;

#[test]
fn test_limit_conn_burst_rejects_overflow() {
    let sim = armed_world(0);
    let node = limit_conn(5, delay_fixed(100.0, server("x")).unwrap());
    let requests = run_burst(&sim, 10, node.clone()).unwrap();

    let (admitted, rejected) = requests.split_at(5);
    for req in admitted {
        assert_eq!(req.served_by(), Some("x"));
        assert_eq!(req.latency(), Some(Duration::from_millis(100)));
    }
    for req in rejected {
        assert_eq!(req.error(), Some(&SimulatedError::Rejected));
        assert_eq!(req.error().map(ToString::to_string).as_deref(), Some("rejected"));
        assert_eq!(req.latency(), Some(Duration::ZERO));
    }
    assert_eq!(sim.current_time(), Duration::from_millis(100));
    assert_eq!(node.in_flight(), 0);
}
