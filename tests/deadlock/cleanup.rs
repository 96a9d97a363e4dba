use std::sync::Arc;
use std::time::Duration;

use contention_lab::path::PathTimings;
use contention_lab::{run_load, Config, LoadPlan, LockId, Operation, ServiceContext};

fn context(timings: PathTimings, timeout_threshold_ms: u64) -> Arc<ServiceContext> {
    let mut config = Config {
        enable_deadlock_simulation: true,
        path_timings: timings,
        ..Config::default()
    };
    config.performance_settings.timeout_threshold_ms = timeout_threshold_ms;
    Arc::new(ServiceContext::new(config))
}

/// After any mix of outcomes both locks can be taken immediately.
async fn assert_locks_acquirable(ctx: &ServiceContext) {
    for id in LockId::ALL {
        let guard = ctx
            .locks()
            .try_acquire(id, Duration::ZERO)
            .await
            .unwrap_or_else(|e| panic!("{id} still held: {e}"));
        guard.release().unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn locks_free_after_lock_timeouts() {
    let ctx = context(PathTimings::fixed(100, 30, 30), 60_000);
    let summary = run_load(ctx.clone(), LoadPlan { pairs: 5, rounds: 3 }).await;

    assert!(summary.outcomes.lock_timeouts > 0);
    assert!(summary.locks_free);
    assert_locks_acquirable(&ctx).await;
    assert!(ctx.locks().stats().iter().all(|s| s.release_violations == 0));
}

#[tokio::test(start_paused = true)]
async fn locks_free_after_outer_deadline_cancellations() {
    // Request deadline is 150ms; holding the first lock alone takes 300ms.
    let ctx = context(PathTimings::fixed(10_000, 300, 30), 100);
    let summary = run_load(ctx.clone(), LoadPlan { pairs: 2, rounds: 2 }).await;

    assert_eq!(summary.outcomes.request_timeouts, 8);
    assert_eq!(summary.snapshot.timeout_requests, 8);
    assert_eq!(ctx.workers().busy(), 0);
    assert!(summary.locks_free);
    assert_locks_acquirable(&ctx).await;
}

#[tokio::test(start_paused = true)]
async fn service_recovers_after_contention_is_switched_off() {
    let ctx = context(PathTimings::fixed(100, 30, 30), 60_000);
    run_load(ctx.clone(), LoadPlan { pairs: 3, rounds: 2 }).await;

    ctx.set_simulate_contention(false);
    let before = ctx.snapshot().successful_requests;
    for operation in [Operation::Order, Operation::Inventory] {
        let timed = ctx.execute(operation, None).await;
        assert!(timed.value.unwrap().is_ok());
    }
    assert_eq!(ctx.snapshot().successful_requests, before + 2);
}
