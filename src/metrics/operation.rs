use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::aggregator::rate;
use super::OutcomeKind;
use crate::path::Operation;

/// Counters for one request path.
#[derive(Default)]
pub struct OperationStats {
    total: AtomicU64,
    successful: AtomicU64,
    timed_out: AtomicU64,
    lock_contention: AtomicU64,
    failed: AtomicU64,
}

/// Serializable view of [`OperationStats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub timeout_requests: u64,
    /// Failed bounded lock acquisitions, i.e. suspected deadlocks.
    pub deadlock_detected: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub timeout_rate: f64,
}

impl OperationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a started request; the returned tracker records how it ends.
    pub fn begin(self: &Arc<Self>) -> OperationTracker {
        self.total.fetch_add(1, Ordering::Relaxed);
        OperationTracker {
            stats: self.clone(),
            finished: false,
        }
    }

    fn record(&self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Success => {
                self.successful.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeKind::LockTimeout => {
                self.lock_contention.fetch_add(1, Ordering::Relaxed);
                self.timed_out.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeKind::RequestTimeout => {
                self.timed_out.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeKind::Error => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> OperationStatsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let successful = self.successful.load(Ordering::Relaxed);
        let timed_out = self.timed_out.load(Ordering::Relaxed);
        OperationStatsSnapshot {
            total_requests: total,
            successful_requests: successful,
            timeout_requests: timed_out,
            deadlock_detected: self.lock_contention.load(Ordering::Relaxed),
            failed_requests: self.failed.load(Ordering::Relaxed),
            success_rate: rate(successful, total),
            timeout_rate: rate(timed_out, total),
        }
    }
}

/// Records the end of one path execution; a dropped tracker counts as a
/// request timeout.
pub struct OperationTracker {
    stats: Arc<OperationStats>,
    finished: bool,
}

impl OperationTracker {
    pub fn finish(mut self, kind: OutcomeKind) {
        self.stats.record(kind);
        self.finished = true;
    }
}

impl Drop for OperationTracker {
    fn drop(&mut self) {
        if !self.finished {
            self.stats.record(OutcomeKind::RequestTimeout);
        }
    }
}

/// Per-path stats for both operations.
#[derive(Default)]
pub struct OperationMetrics {
    order: Arc<OperationStats>,
    inventory: Arc<OperationStats>,
}

impl OperationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, operation: Operation) -> &Arc<OperationStats> {
        match operation {
            Operation::Order => &self.order,
            Operation::Inventory => &self.inventory,
        }
    }
}
