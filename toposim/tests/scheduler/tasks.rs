use std::{cell::Cell, rc::Rc, time::Duration};

use toposim::{SimWorld, SimulationError, TaskState};

use super::armed_world;

#[test]
fn test_operations_require_reset() {
    let sim = SimWorld::new();
    assert!(matches!(
        sim.spawn(async {}),
        Err(SimulationError::InvalidState(_))
    ));
    assert!(matches!(
        sim.await_quiescence(),
        Err(SimulationError::InvalidState(_))
    ));
    sim.reset().unwrap();
    assert_eq!(sim.block_on(async { 3 }).unwrap(), 3);
}

#[test]
fn test_join_handle_across_tasks() {
    let sim = armed_world(0);
    let ctx = sim.context();
    let total = sim
        .block_on(async move {
            let mut handles = Vec::new();
            for i in 1..=4u64 {
                let child = ctx.clone();
                handles.push(
                    ctx.spawn(async move {
                        child.sleep(Duration::from_millis(i * 10)).await.unwrap();
                        i
                    })
                    .unwrap(),
                );
            }
            let mut total = 0;
            for handle in handles {
                total += handle.await.unwrap();
            }
            (total, ctx.now().unwrap())
        })
        .unwrap();
    assert_eq!(total, (10, Duration::from_millis(40)));
}

#[test]
fn test_try_take_before_completion() {
    let sim = armed_world(0);
    let ctx = sim.context();
    let mut handle = sim
        .spawn(async move {
            ctx.sleep(Duration::from_millis(1)).await.unwrap();
            "done"
        })
        .unwrap();
    assert!(matches!(
        handle.try_take(),
        Err(SimulationError::InvalidState(_))
    ));
    sim.await_quiescence().unwrap();
    assert_eq!(handle.try_take().unwrap(), "done");
}

#[test]
fn test_task_state_transitions() {
    let sim = armed_world(0);
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let ctx = sim.context();
    let sleeper = sim
        .spawn(async move {
            ctx.sleep(Duration::from_millis(25)).await.unwrap();
        })
        .unwrap()
        .task_id();
    let parked = sim
        .spawn(async move {
            let _ = rx.await;
        })
        .unwrap()
        .task_id();

    assert_eq!(sim.task_state(sleeper), Some(TaskState::Runnable));
    sim.run_until_idle();
    assert_eq!(
        sim.task_state(sleeper),
        Some(TaskState::Sleeping {
            until: Duration::from_millis(25)
        })
    );
    assert_eq!(sim.task_state(parked), Some(TaskState::Parked));

    tx.send(()).unwrap();
    sim.await_quiescence().unwrap();
    assert_eq!(sim.task_state(sleeper), Some(TaskState::Completed));
    assert_eq!(sim.task_state(parked), Some(TaskState::Completed));
}

#[test]
fn test_reset_starts_a_new_epoch() {
    let sim = armed_world(0);
    let ctx = sim.context();
    let first = sim
        .block_on({
            let ctx = ctx.clone();
            async move {
                ctx.sleep(Duration::from_millis(50)).await.unwrap();
                (ctx.new_request().unwrap(), ctx.new_request().unwrap())
            }
        })
        .unwrap();
    assert_eq!(first.1.id.0, 1);
    assert_eq!(sim.current_time(), Duration::from_millis(50));

    sim.reset().unwrap();
    assert_eq!(sim.epoch(), 2);
    assert_eq!(sim.current_time(), Duration::ZERO);

    let second = sim.block_on(async move { ctx.new_request().unwrap() }).unwrap();
    assert_eq!(second.id.0, 0);
    assert_eq!(second.start_time, Duration::ZERO);
}

#[test]
fn test_reset_refused_inside_a_task() {
    let sim = armed_world(0);
    let world = sim.clone();
    let result = sim.block_on(async move { world.reset() }).unwrap();
    assert!(matches!(result, Err(SimulationError::InvalidState(_))));
}

#[test]
fn test_daemons_are_dropped_by_reset() {
    let sim = armed_world(0);
    let ticks = Rc::new(Cell::new(0u32));
    {
        let ctx = sim.context();
        let ticks = ticks.clone();
        sim.spawn_daemon(async move {
            while ctx.sleep(Duration::from_millis(3)).await.is_ok() {
                ticks.set(ticks.get() + 1);
            }
        })
        .unwrap();
    }
    let ctx = sim.context();
    sim.block_on(async move { ctx.sleep(Duration::from_millis(10)).await.unwrap() })
        .unwrap();
    assert_eq!(ticks.get(), 3);
    assert_eq!(sim.daemon_task_count(), 1);
    assert!(sim.is_quiescent());

    sim.reset().unwrap();
    assert_eq!(sim.daemon_task_count(), 0);
    assert_eq!(Rc::strong_count(&ticks), 1);
}

#[test]
fn test_metrics_count_the_run() {
    let sim = armed_world(0);
    for ms in [5u64, 10] {
        let ctx = sim.context();
        sim.spawn(async move { ctx.sleep(Duration::from_millis(ms)).await.unwrap() })
            .unwrap();
    }
    let metrics = sim.await_quiescence().unwrap();
    assert_eq!(metrics.simulated_time, Duration::from_millis(10));
    assert_eq!(metrics.events_processed, 2);
    assert_eq!(metrics.tasks_spawned, 2);
    assert_eq!(metrics.polls, 4);
    assert_eq!(sim.extract_metrics().events_processed, 2);
}
