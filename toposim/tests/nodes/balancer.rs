use std::time::Duration;

use toposim::{
    nodes::{delay_fixed, lb_min_conn, lb_random, lb_rr, limit_conn, pool, server},
    run_burst, run_poisson, submit, NodeRef, SimulatedError, SimulationError,
};

use super::{armed_world, run_sequential};

fn labelled_servers(n: usize) -> toposim::nodes::Pool {
    pool(n, |i| Ok(server(format!("s{i}")) as NodeRef)).unwrap()
}

#[test]
fn test_round_robin_cycles_through_pool() {
    let sim = armed_world(0);
    let lb = lb_rr(labelled_servers(3));
    let requests = run_sequential(&sim, 7, lb.clone());

    let served: Vec<&str> = requests.iter().map(|r| r.served_by().unwrap()).collect();
    assert_eq!(served, ["s0", "s1", "s2", "s0", "s1", "s2", "s0"]);
    assert_eq!(lb.pool().dispatched(), vec![3, 2, 2]);
}

#[test]
fn test_random_reaches_every_worker() {
    let sim = armed_world(9);
    let lb = lb_random(labelled_servers(4));
    run_sequential(&sim, 400, lb.clone());

    let dispatched = lb.pool().dispatched();
    assert_eq!(dispatched.iter().sum::<u64>(), 400);
    assert!(dispatched.iter().all(|&n| n > 50), "{dispatched:?}");
}

#[test]
fn test_min_conn_picks_least_loaded() {
    let sim = armed_world(0);
    let workers = pool(3, |i| {
        let ms = [100.0, 10.0, 50.0][i];
        Ok(delay_fixed(ms, server(format!("s{i}")))? as NodeRef)
    })
    .unwrap();
    let lb: NodeRef = lb_min_conn(workers, None).unwrap();

    let ctx = sim.context();
    let served = sim
        .block_on(async move {
            // Three concurrent arrivals fill every worker once.
            let mut first = Vec::new();
            for _ in 0..3 {
                let task_ctx = ctx.clone();
                let lb = lb.clone();
                first.push(ctx.spawn(async move {
                    let req = task_ctx.new_request()?;
                    submit(&task_ctx, &lb, req).await
                })?);
            }
            // At 20ms only s1 (10ms) has returned.
            ctx.sleep(Duration::from_millis(20)).await?;
            let late = submit(&ctx, &lb, ctx.new_request()?).await?;

            let mut served = Vec::new();
            for handle in first {
                served.push(handle.await??.served_by().map(str::to_string));
            }
            served.push(late.served_by().map(str::to_string));
            Ok::<_, SimulationError>(served)
        })
        .unwrap()
        .unwrap();

    let served: Vec<&str> = served.iter().map(|s| s.as_deref().unwrap()).collect();
    assert_eq!(served, ["s0", "s1", "s2", "s1"]);
}

#[test]
fn test_connections_released_after_every_outcome() {
    let sim = armed_world(0);
    let lb = lb_rr(
        pool(2, |_| {
            Ok(limit_conn(1, delay_fixed(5.0, server("x"))?) as NodeRef)
        })
        .unwrap(),
    );
    let requests = run_burst(&sim, 6, lb.clone()).unwrap();

    let rejected = requests
        .iter()
        .filter(|r| r.error() == Some(&SimulatedError::Rejected))
        .count();
    assert_eq!(rejected, 4);
    assert_eq!(lb.pool().connections(), vec![0, 0]);
}

#[test]
fn test_min_conn_error_hold_avoids_failing_worker() {
    let broken_then_ok = || {
        pool(2, |i| {
            if i == 0 {
                Ok(limit_conn(0, server("broken")) as NodeRef)
            } else {
                Ok(server("ok") as NodeRef)
            }
        })
        .unwrap()
    };

    let sim = armed_world(0);
    let held = run_sequential(&sim, 4, lb_min_conn(broken_then_ok(), Some(100.0)).unwrap());
    let outcomes: Vec<Option<&str>> = held.iter().map(|r| r.served_by()).collect();
    assert_eq!(outcomes, [None, Some("ok"), Some("ok"), Some("ok")]);

    sim.reset().unwrap();
    let plain = run_sequential(&sim, 4, lb_min_conn(broken_then_ok(), None).unwrap());
    assert!(plain.iter().all(|r| r.is_error()));
}

#[test]
fn test_min_conn_falls_back_when_all_workers_held() {
    let sim = armed_world(0);
    let lb = lb_min_conn(
        pool(2, |_| Ok(limit_conn(0, server("x")) as NodeRef)).unwrap(),
        Some(1000.0),
    )
    .unwrap();
    let requests = run_sequential(&sim, 3, lb.clone());
    assert!(requests.iter().all(|r| r.is_error()));
    assert_eq!(lb.pool().dispatched(), vec![2, 1]);
}

#[test]
fn test_min_conn_spreads_poisson_load() {
    let sim = armed_world(21);
    let lb = lb_min_conn(
        pool(3, |i| Ok(delay_fixed(30.0, server(format!("s{i}")))? as NodeRef)).unwrap(),
        None,
    )
    .unwrap();
    let requests = run_poisson(&sim, 600, 5.0, lb.clone()).unwrap();

    assert!(requests.iter().all(|r| r.is_success()));
    let dispatched = lb.pool().dispatched();
    assert_eq!(dispatched.iter().sum::<u64>(), 600);
    assert!(dispatched.iter().all(|&n| n > 100), "{dispatched:?}");
    assert_eq!(lb.pool().connections(), vec![0, 0, 0]);
}
