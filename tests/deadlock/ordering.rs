use std::sync::Arc;

use contention_lab::path::PathTimings;
use contention_lab::{run_load, Config, HealthStatus, LoadPlan, ServiceContext};

fn context(consistent: bool, timings: PathTimings) -> Arc<ServiceContext> {
    let mut config = Config {
        enable_deadlock_simulation: true,
        use_consistent_lock_order: consistent,
        path_timings: timings,
        ..Config::default()
    };
    config.performance_settings.timeout_threshold_ms = 60_000;
    Arc::new(ServiceContext::new(config))
}

#[tokio::test(start_paused = true)]
async fn opposite_orders_raise_the_timeout_rate() {
    let ctx = context(false, PathTimings::fixed(150, 50, 50));
    let summary = run_load(ctx.clone(), LoadPlan { pairs: 4, rounds: 5 }).await;

    assert_eq!(summary.snapshot.total_requests, 40);
    assert!(summary.snapshot.timeout_rate > 5.0);
    assert!(summary.snapshot.lock_timeouts > 0);
    assert_eq!(
        summary.snapshot.lock_timeouts,
        summary.orders.deadlock_detected + summary.inventory.deadlock_detected
    );
    assert_ne!(summary.verdict.status, HealthStatus::Healthy);
    assert!(summary.verdict.contention_probability > 0.0);
}

#[tokio::test(start_paused = true)]
async fn shared_order_never_times_out() {
    let ctx = context(true, PathTimings::fixed(5000, 10, 10));
    let summary = run_load(ctx.clone(), LoadPlan { pairs: 8, rounds: 5 }).await;

    assert!(summary.consistent_order);
    assert_eq!(summary.snapshot.total_requests, 80);
    assert_eq!(summary.snapshot.successful_requests, 80);
    assert_eq!(summary.snapshot.timeout_requests, 0);
    assert_eq!(summary.snapshot.lock_timeouts, 0);
    assert_eq!(summary.orders.deadlock_detected, 0);
    assert_eq!(summary.inventory.deadlock_detected, 0);
    assert!(ctx.locks().stats().iter().all(|s| s.timeouts == 0));
}

#[tokio::test(start_paused = true)]
async fn every_request_is_counted_exactly_once() {
    let ctx = context(false, PathTimings::fixed(80, 40, 40));
    let summary = run_load(ctx, LoadPlan { pairs: 3, rounds: 4 }).await;

    let s = &summary.snapshot;
    assert_eq!(s.total_requests, 24);
    assert_eq!(
        s.successful_requests + s.timeout_requests + s.failed_requests,
        s.total_requests
    );
    assert_eq!(s.in_flight, 0);
    assert_eq!(summary.outcomes.total(), 24);
    assert_eq!(summary.orders.total_requests + summary.inventory.total_requests, 24);
}
