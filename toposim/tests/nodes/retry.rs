use std::cell::Cell;

use async_trait::async_trait;
use toposim::{
    nodes::{delay_fixed, faulty, retry, server},
    run_poisson, Node, NodeRef, Request, SimContext, SimulatedError, SimulationError,
    SimulationResult,
};

use super::{armed_world, run_one};

/// Fails the first `failures` requests it sees, then succeeds.
struct FailFirst {
    failures: Cell<u32>,
}

#[async_trait(?Send)]
impl Node for FailFirst {
    async fn process(&self, _ctx: &SimContext, req: Request) -> SimulationResult<Request> {
        let left = self.failures.get();
        if left > 0 {
            self.failures.set(left - 1);
            return Ok(req.fail(SimulatedError::Failed("flaky".to_string())));
        }
        Ok(req.succeed("flaky"))
    }

    fn describe(&self) -> String {
        "fail_first".to_string()
    }
}

fn fail_first(failures: u32) -> NodeRef {
    std::rc::Rc::new(FailFirst {
        failures: Cell::new(failures),
    })
}

#[test]
fn test_zero_attempts_rejected() {
    assert!(matches!(
        retry(0, server("x")),
        Err(SimulationError::InvalidArgument(_))
    ));
}

#[test]
fn test_first_success_is_returned() {
    let sim = armed_world(0);
    let req = run_one(&sim, retry(3, fail_first(2)).unwrap());
    assert!(req.is_success());
    assert_eq!(req.attempts, 3);
}

#[test]
fn test_last_error_after_exhaustion() {
    let sim = armed_world(0);
    let req = run_one(&sim, retry(3, fail_first(5)).unwrap());
    assert_eq!(
        req.error(),
        Some(&SimulatedError::Failed("flaky".to_string()))
    );
    assert_eq!(req.attempts, 3);
}

#[test]
fn test_attempts_bounded_under_faults() {
    let sim = armed_world(6);
    let node = retry(
        3,
        faulty(30.0, 30.0, delay_fixed(1.0, server("x")).unwrap()).unwrap(),
    )
    .unwrap();
    let requests = run_poisson(&sim, 2000, 4.0, node).unwrap();

    for req in &requests {
        assert!((1..=3).contains(&req.attempts), "{} made {} attempts", req.id, req.attempts);
        if req.is_error() {
            assert_eq!(req.attempts, 3);
        }
    }
    assert!(requests.iter().any(|r| r.attempts > 1));
}
