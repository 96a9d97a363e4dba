use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::classifier::round2;
use super::{classify, HealthStatus, HealthThresholds};
use crate::metrics::MetricsSnapshot;

/// What a single check decided.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub status: HealthStatus,
    pub description: String,
    pub data: Map<String, Value>,
}

/// One named entry of a [`HealthReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    pub name: String,
    pub status: HealthStatus,
    pub description: String,
    pub duration_ms: f64,
    pub data: Map<String, Value>,
}

/// Composite health of the service: the worst of its checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub checks: Vec<HealthCheckResult>,
    pub total_duration_ms: f64,
}

impl HealthReport {
    pub fn from_checks(checks: Vec<HealthCheckResult>, total: Duration) -> Self {
        let status = checks
            .iter()
            .map(|c| c.status)
            .fold(HealthStatus::Healthy, HealthStatus::worst);
        HealthReport {
            status,
            timestamp: Utc::now(),
            checks,
            total_duration_ms: millis(total),
        }
    }

    pub fn check(&self, name: &str) -> Option<&HealthCheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }
}

/// Run `check` and stamp the result with `name` and how long it took.
pub fn timed_check<F>(name: &str, check: F) -> HealthCheckResult
where
    F: FnOnce() -> CheckOutcome,
{
    let started = Instant::now();
    let outcome = check();
    HealthCheckResult {
        name: name.to_string(),
        status: outcome.status,
        description: outcome.description,
        duration_ms: millis(started.elapsed()),
        data: outcome.data,
    }
}

/// Response time, timeout and concurrency symptoms, run through [`classify`].
pub fn performance_check(
    snapshot: &MetricsSnapshot,
    worker_utilization: f64,
    thresholds: &HealthThresholds,
) -> CheckOutcome {
    let verdict = classify(snapshot, worker_utilization, thresholds);
    CheckOutcome {
        status: verdict.status,
        description: verdict.description,
        data: verdict.diagnostics,
    }
}

/// Busy share of the worker pool.
pub fn worker_pool_check(busy: usize, capacity: usize, thresholds: &HealthThresholds) -> CheckOutcome {
    let utilization = utilization_percent(busy, capacity);
    let status = if utilization >= thresholds.critical_worker_utilization() {
        HealthStatus::Unhealthy
    } else if utilization >= thresholds.warn_worker_utilization {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    let mut data = Map::new();
    data.insert("busyWorkers".into(), json!(busy));
    data.insert("maxWorkers".into(), json!(capacity));
    data.insert("availableWorkers".into(), json!(capacity.saturating_sub(busy)));
    data.insert("utilizationPercent".into(), json!(round2(utilization)));

    CheckOutcome {
        status,
        description: format!("{busy}/{capacity} workers busy ({utilization:.1}%)"),
        data,
    }
}

/// Resident memory against a fixed threshold.
///
/// Reaching the threshold degrades the service but never makes it
/// unhealthy. Missing process information is reported, not failed.
pub fn memory_check(resident_bytes: Option<u64>, threshold_mb: u64) -> CheckOutcome {
    let mut data = Map::new();
    data.insert("thresholdMb".into(), json!(threshold_mb));

    let Some(bytes) = resident_bytes else {
        return CheckOutcome {
            status: HealthStatus::Healthy,
            description: "Process memory information unavailable".to_string(),
            data,
        };
    };

    let used_mb = bytes as f64 / (1024.0 * 1024.0);
    data.insert("allocatedMb".into(), json!(round2(used_mb)));

    let status = if used_mb >= threshold_mb as f64 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };
    CheckOutcome {
        status,
        description: format!("{used_mb:.1}MB resident (threshold {threshold_mb}MB)"),
        data,
    }
}

/// Resident set size of this process, if the platform reports it.
pub fn process_resident_bytes() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = sysinfo::System::new();
    if !system.refresh_process(pid) {
        return None;
    }
    system.process(pid).map(|p| p.memory())
}

/// `busy / capacity` as a percentage; an empty pool counts as idle.
pub fn utilization_percent(busy: usize, capacity: usize) -> f64 {
    if capacity == 0 {
        0.0
    } else {
        busy as f64 / capacity as f64 * 100.0
    }
}

fn millis(d: Duration) -> f64 {
    round2(d.as_secs_f64() * 1000.0)
}
