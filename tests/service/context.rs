use std::sync::Arc;
use std::time::Duration;

use contention_lab::path::PathTimings;
use contention_lab::{
    Config, HealthStatus, LockId, Operation, OutcomeKind, ServiceContext, ServiceError,
};

use crate::support::{contended, fast_path};

#[tokio::test(start_paused = true)]
async fn execute_records_success() {
    let ctx = fast_path();
    let timed = ctx.execute(Operation::Order, Some(42)).await;

    assert_eq!(timed.outcome.kind, OutcomeKind::Success);
    assert_eq!(timed.outcome.operation, Some(Operation::Order));
    let report = timed.value.unwrap().unwrap();
    assert_eq!(report.business_id, 42);
    assert!(!report.contended);

    let snapshot = ctx.snapshot();
    assert_eq!(snapshot.total_requests, 1);
    assert_eq!(snapshot.successful_requests, 1);
    assert_eq!(snapshot.in_flight, 0);
    assert_eq!(ctx.operation_stats(Operation::Order).snapshot().total_requests, 1);
    assert_eq!(ctx.operation_stats(Operation::Inventory).snapshot().total_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn opposite_order_pair_reports_lock_timeout() {
    let ctx = contended(false, PathTimings::fixed(100, 20, 30));

    let (order, inventory) = tokio::join!(
        ctx.execute(Operation::Order, Some(1)),
        ctx.execute(Operation::Inventory, Some(2)),
    );

    let kinds = [order.outcome.kind, inventory.outcome.kind];
    assert!(kinds.contains(&OutcomeKind::LockTimeout));

    let err = [order.value.unwrap(), inventory.value.unwrap()]
        .into_iter()
        .find_map(Result::err)
        .unwrap();
    assert_eq!(err.status_code(), 408);
    assert_eq!(err.body()["status"], "Timeout");
    assert!(err.body()["processingTimeMs"].as_u64().unwrap() >= 100);

    assert!(ctx.locks().all_free());
    assert!(ctx.snapshot().lock_timeouts >= 1);
    assert_eq!(ctx.verdict().status, HealthStatus::Unhealthy);
}

#[tokio::test(start_paused = true)]
async fn outer_deadline_cancels_and_releases() {
    let mut config = Config {
        enable_deadlock_simulation: true,
        path_timings: PathTimings::fixed(5000, 400, 50),
        ..Config::default()
    };
    config.performance_settings.timeout_threshold_ms = 200;
    let ctx = Arc::new(ServiceContext::new(config));
    assert_eq!(ctx.request_timeout(), Duration::from_millis(300));

    let timed = ctx.execute(Operation::Order, None).await;
    assert_eq!(timed.outcome.kind, OutcomeKind::RequestTimeout);
    assert!(matches!(
        timed.value,
        Some(Err(ServiceError::RequestTimeout { .. }))
    ));

    assert!(ctx.locks().all_free());
    assert!(!ctx.locks().get(LockId::A).is_held());
    let order = ctx.operation_stats(Operation::Order).snapshot();
    assert_eq!(order.timeout_requests, 1);
    assert_eq!(ctx.snapshot().timeout_requests, 1);
    assert_eq!(ctx.workers().busy(), 0);
}

#[tokio::test(start_paused = true)]
async fn toggling_contention_switches_paths() {
    let ctx = fast_path();
    ctx.set_simulate_contention(true);
    let timed = ctx.execute(Operation::Inventory, None).await;
    let report = timed.value.unwrap().unwrap();
    assert!(report.contended);
    assert_eq!(report.attempts.len(), 2);

    ctx.set_simulate_contention(false);
    let timed = ctx.execute(Operation::Inventory, None).await;
    assert!(!timed.value.unwrap().unwrap().contended);
}

#[test]
fn fresh_context_is_healthy() {
    let ctx = fast_path();
    let report = ctx.health_report();
    assert_eq!(report.checks.len(), 3);
    assert!(report.check("performance").is_some());
    assert!(report.check("worker_pool").is_some());
    assert_eq!(ctx.verdict().status, HealthStatus::Healthy);
}
