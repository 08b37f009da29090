use std::time::Duration;

use toposim::SimulationError;

use super::{armed_world, fast_stall_world};

#[test]
fn test_parked_task_reports_stall() {
    let sim = fast_stall_world();
    // The sender stays alive but nobody will ever use it.
    let (_tx, rx) = tokio::sync::oneshot::channel::<()>();
    let ctx = sim.context();
    sim.spawn(async move {
        ctx.sleep(Duration::from_millis(10)).await.unwrap();
        let _ = rx.await;
    })
    .unwrap();

    let err = sim.await_quiescence().unwrap_err();
    assert_eq!(
        err,
        SimulationError::SchedulerStalled {
            blocked_tasks: 1,
            at: Duration::from_millis(10),
        }
    );
    // The stuck task is still registered, so the world cannot be reused.
    assert!(matches!(
        sim.reset(),
        Err(SimulationError::InvalidState(_))
    ));
}

#[test]
fn test_stall_ignores_daemon_events() {
    let sim = fast_stall_world();
    let ctx = sim.context();
    sim.spawn_daemon(async move {
        while ctx.sleep(Duration::from_millis(1)).await.is_ok() {}
    })
    .unwrap();

    let (_tx, rx) = tokio::sync::oneshot::channel::<()>();
    sim.spawn(async move {
        let _ = rx.await;
    })
    .unwrap();

    assert!(matches!(
        sim.await_quiescence(),
        Err(SimulationError::SchedulerStalled { blocked_tasks: 1, .. })
    ));
}

#[test]
fn test_external_wakeup_before_timeout() {
    let sim = armed_world(0);
    let (tx, rx) = tokio::sync::oneshot::channel::<u32>();
    let waiter = sim
        .spawn(async move { rx.await.unwrap_or_default() })
        .unwrap();

    let sender = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        let _ = tx.send(5);
    });

    let mut waiter = waiter;
    sim.await_quiescence().unwrap();
    sender.join().unwrap();
    assert_eq!(waiter.try_take().unwrap(), 5);
    assert_eq!(sim.current_time(), Duration::ZERO);
}
