use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::metrics::MetricsSnapshot;

/// Three-level health verdict, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// The more severe of two statuses.
    pub fn worst(self, other: HealthStatus) -> HealthStatus {
        self.max(other)
    }
}

/// Classification thresholds. Rates and utilization are percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct HealthThresholds {
    pub healthy_response_ms: f64,
    pub degraded_response_ms: f64,
    pub critical_timeout_rate: f64,
    pub warn_timeout_rate: f64,
    /// Unhealthy once free workers drop to this share of the pool.
    pub critical_worker_headroom: f64,
    pub warn_worker_utilization: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        HealthThresholds {
            healthy_response_ms: 500.0,
            degraded_response_ms: 2000.0,
            critical_timeout_rate: 20.0,
            warn_timeout_rate: 5.0,
            critical_worker_headroom: 10.0,
            warn_worker_utilization: 80.0,
        }
    }
}

impl HealthThresholds {
    pub fn critical_worker_utilization(&self) -> f64 {
        100.0 - self.critical_worker_headroom
    }
}

/// The rule that decided a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthRule {
    CriticalTimeoutRate,
    WorkerSaturation,
    SevereLatency,
    ElevatedTimeoutRate,
    ElevatedLatency,
    HighWorkerUtilization,
    WithinThresholds,
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthVerdict {
    pub status: HealthStatus,
    pub rule: HealthRule,
    pub description: String,
    /// Advisory 0–100 score; not part of the decision.
    pub contention_probability: f64,
    pub diagnostics: Map<String, Value>,
}

/// Map a metrics snapshot and worker utilization to a health verdict.
///
/// Rules are checked most severe first and the first match wins.
pub fn classify(
    snapshot: &MetricsSnapshot,
    worker_utilization: f64,
    thresholds: &HealthThresholds,
) -> HealthVerdict {
    let timeout_rate = snapshot.timeout_rate;
    let avg = snapshot.average_ms;

    let (status, rule, description) = if timeout_rate >= thresholds.critical_timeout_rate {
        (
            HealthStatus::Unhealthy,
            HealthRule::CriticalTimeoutRate,
            format!("Timeout rate {timeout_rate:.1}% indicates likely deadlock"),
        )
    } else if worker_utilization >= thresholds.critical_worker_utilization() {
        (
            HealthStatus::Unhealthy,
            HealthRule::WorkerSaturation,
            format!("Worker pool saturated at {worker_utilization:.1}%"),
        )
    } else if avg >= 2.0 * thresholds.degraded_response_ms {
        (
            HealthStatus::Unhealthy,
            HealthRule::SevereLatency,
            format!("Average response time {avg:.0}ms is critically high"),
        )
    } else if timeout_rate >= thresholds.warn_timeout_rate {
        (
            HealthStatus::Degraded,
            HealthRule::ElevatedTimeoutRate,
            format!("Timeout rate {timeout_rate:.1}% is elevated"),
        )
    } else if avg >= thresholds.degraded_response_ms {
        (
            HealthStatus::Degraded,
            HealthRule::ElevatedLatency,
            format!("Average response time {avg:.0}ms is degraded"),
        )
    } else if worker_utilization >= thresholds.warn_worker_utilization {
        (
            HealthStatus::Degraded,
            HealthRule::HighWorkerUtilization,
            format!("Worker pool utilization {worker_utilization:.1}% is high"),
        )
    } else if avg <= thresholds.healthy_response_ms {
        (
            HealthStatus::Healthy,
            HealthRule::WithinThresholds,
            "Response times are healthy".to_string(),
        )
    } else {
        (
            HealthStatus::Healthy,
            HealthRule::WithinThresholds,
            format!("Average response time {avg:.0}ms is acceptable"),
        )
    };

    let contention_probability = contention_probability(timeout_rate, avg, worker_utilization);

    let mut diagnostics = Map::new();
    diagnostics.insert("p50ResponseTimeMs".into(), json!(snapshot.p50_ms));
    diagnostics.insert("p95ResponseTimeMs".into(), json!(snapshot.p95_ms));
    diagnostics.insert("p99ResponseTimeMs".into(), json!(snapshot.p99_ms));
    diagnostics.insert("averageResponseTimeMs".into(), json!(round2(avg)));
    diagnostics.insert("totalRequests".into(), json!(snapshot.total_requests));
    diagnostics.insert("timeoutRequests".into(), json!(snapshot.timeout_requests));
    diagnostics.insert("timeoutRatePercent".into(), json!(round2(timeout_rate)));
    diagnostics.insert("concurrentRequests".into(), json!(snapshot.in_flight));
    diagnostics.insert(
        "workerUtilizationPercent".into(),
        json!(round2(worker_utilization)),
    );
    diagnostics.insert(
        "contentionProbabilityPercent".into(),
        json!(round2(contention_probability)),
    );

    HealthVerdict {
        status,
        rule,
        description,
        contention_probability,
        diagnostics,
    }
}

/// Heuristic likelihood (percent) that the symptoms come from lock
/// contention: weighted timeout rate, latency and worker utilization, each
/// capped at its saturation point.
pub fn contention_probability(timeout_rate: f64, avg_response_ms: f64, worker_utilization: f64) -> f64 {
    let timeouts = (timeout_rate / 20.0).clamp(0.0, 1.0);
    let latency = (avg_response_ms / 5000.0).clamp(0.0, 1.0);
    let workers = (worker_utilization / 100.0).clamp(0.0, 1.0);
    (0.5 * timeouts + 0.3 * latency + 0.2 * workers) * 100.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
