//! The service context handed to every request.
//!
//! Holds what the original process kept as globals: the two business
//! locks, the metrics, and the worker pool. One context is one
//! independent service instance.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use super::error::ServiceError;
use super::pool::WorkerPool;
use super::timing::{timed, Timed};
use crate::config::Config;
use crate::health::{
    classify, memory_check, performance_check, process_resident_bytes, timed_check,
    worker_pool_check, HealthReport, HealthThresholds, HealthVerdict,
};
use crate::lock::LockRegistry;
use crate::metrics::{
    MetricsAggregator, MetricsSnapshot, OperationMetrics, OperationStats, OutcomeKind,
};
use crate::path::{Operation, PathError, PathPlan, PathReport, PathRunner};

pub struct ServiceContext {
    config: Config,
    simulate_contention: AtomicBool,
    locks: LockRegistry,
    metrics: Arc<MetricsAggregator>,
    operations: OperationMetrics,
    workers: WorkerPool,
    order_plan: PathPlan,
    inventory_plan: PathPlan,
    thresholds: HealthThresholds,
}

impl ServiceContext {
    pub fn new(config: Config) -> Self {
        let order_plan = PathPlan::order(&config.path_timings);
        let inventory_plan =
            PathPlan::inventory(&config.path_timings, config.use_consistent_lock_order);

        tracing::info!(
            simulate_contention = config.enable_deadlock_simulation,
            order_locks = ?order_plan.lock_order,
            inventory_locks = ?inventory_plan.lock_order,
            workers = config.worker_pool_size,
            "service context created"
        );

        ServiceContext {
            simulate_contention: AtomicBool::new(config.enable_deadlock_simulation),
            locks: LockRegistry::new(),
            metrics: Arc::new(MetricsAggregator::new()),
            operations: OperationMetrics::new(),
            workers: WorkerPool::new(config.worker_pool_size),
            thresholds: config.health_thresholds(),
            order_plan,
            inventory_plan,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    pub fn operation_stats(&self, operation: Operation) -> &Arc<OperationStats> {
        self.operations.get(operation)
    }

    pub fn plan(&self, operation: Operation) -> &PathPlan {
        match operation {
            Operation::Order => &self.order_plan,
            Operation::Inventory => &self.inventory_plan,
        }
    }

    pub fn simulate_contention(&self) -> bool {
        self.simulate_contention.load(Ordering::Relaxed)
    }

    /// Switch between the dual-lock protocol and the fast path. Requests
    /// already running keep the mode they started with.
    pub fn set_simulate_contention(&self, enabled: bool) {
        self.simulate_contention.store(enabled, Ordering::Relaxed);
    }

    /// Outer per-request deadline.
    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout()
    }

    /// Run one path execution on a pooled worker and count it against the
    /// operation. A missing `business_id` gets a random one.
    pub async fn run_path(
        &self,
        operation: Operation,
        business_id: Option<i64>,
    ) -> Result<PathReport, ServiceError> {
        let business_id = business_id.unwrap_or_else(random_business_id);
        let tracker = self.operation_stats(operation).begin();

        let _worker = match self.workers.acquire().await {
            Ok(worker) => worker,
            Err(_) => {
                let err = ServiceError::PoolClosed { operation };
                tracker.finish(err.outcome());
                return Err(err);
            }
        };

        let runner = PathRunner::new(&self.locks, self.simulate_contention());
        let result = runner
            .run(self.plan(operation), business_id)
            .await
            .map_err(ServiceError::from);

        match &result {
            Ok(report) => {
                tracker.finish(OutcomeKind::Success);
                tracing::debug!(
                    %operation,
                    business_id,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    contended = report.contended,
                    "path completed"
                );
            }
            Err(err) => {
                tracker.finish(err.outcome());
                if let ServiceError::Path(PathError::Unclassified { .. }) = err {
                    tracing::error!(%operation, business_id, error = %err, "path failed");
                }
            }
        }
        result
    }

    /// [`run_path`](Self::run_path) under the request deadline, recorded
    /// in the aggregate metrics. This is what the HTTP timing layer does
    /// for a business request, without the HTTP.
    pub async fn execute(
        &self,
        operation: Operation,
        business_id: Option<i64>,
    ) -> Timed<Result<PathReport, ServiceError>> {
        let limit = self.request_timeout();
        let mut timed = timed(
            Some(&self.metrics),
            limit,
            Some(operation),
            |result: &Result<PathReport, ServiceError>| match result {
                Ok(_) => OutcomeKind::Success,
                Err(err) => err.outcome(),
            },
            self.run_path(operation, business_id),
        )
        .await;

        if timed.value.is_none() {
            timed.value = Some(Err(ServiceError::RequestTimeout {
                operation: Some(operation),
                limit,
                elapsed: timed.outcome.elapsed,
            }));
        }
        timed
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Classifier verdict over the current metrics and worker utilization.
    pub fn verdict(&self) -> HealthVerdict {
        classify(
            &self.metrics.snapshot(),
            self.workers.utilization(),
            &self.thresholds,
        )
    }

    /// Composite health: performance, worker pool and memory checks.
    pub fn health_report(&self) -> HealthReport {
        let started = Instant::now();
        let snapshot = self.metrics.snapshot();
        let utilization = self.workers.utilization();

        let checks = vec![
            timed_check("performance", || {
                performance_check(&snapshot, utilization, &self.thresholds)
            }),
            timed_check("worker_pool", || {
                worker_pool_check(
                    self.workers.busy(),
                    self.workers.capacity(),
                    &self.thresholds,
                )
            }),
            timed_check("memory", || {
                memory_check(process_resident_bytes(), self.config.memory_threshold_mb)
            }),
        ];

        HealthReport::from_checks(checks, started.elapsed())
    }
}

fn random_business_id() -> i64 {
    rand::thread_rng().gen_range(1000..10_000)
}
