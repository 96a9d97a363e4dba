use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Operation;
use crate::lock::LockId;

/// A labelled range of simulated work, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayRange {
    pub label: &'static str,
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub fn new(label: &'static str, (min_ms, max_ms): (u64, u64)) -> Self {
        DelayRange {
            label,
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
        }
    }

    /// Draw one delay uniformly from the range.
    pub fn sample(&self) -> Duration {
        if self.min_ms == self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }
}

/// Timing knobs shared by both paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PathTimings {
    /// Bounded wait for each lock acquisition.
    pub lock_wait_ms: u64,
    /// Work done on the uncontended path, which takes no locks.
    pub fast_work_ms: (u64, u64),
    /// Work done while holding only the first lock.
    pub first_hold_ms: (u64, u64),
    /// Work done while holding both locks.
    pub critical_section_ms: (u64, u64),
    /// Simulated downstream call made before releasing.
    pub downstream_ms: (u64, u64),
    /// Probability in [0, 1] that the downstream call fails.
    pub downstream_failure_rate: f64,
}

impl Default for PathTimings {
    fn default() -> Self {
        PathTimings {
            lock_wait_ms: 5000,
            fast_work_ms: (10, 50),
            first_hold_ms: (50, 200),
            critical_section_ms: (100, 300),
            downstream_ms: (20, 80),
            downstream_failure_rate: 0.0,
        }
    }
}

impl PathTimings {
    /// The same delays with every range collapsed to a fixed value.
    pub fn fixed(lock_wait_ms: u64, first_hold_ms: u64, critical_section_ms: u64) -> Self {
        PathTimings {
            lock_wait_ms,
            fast_work_ms: (1, 1),
            first_hold_ms: (first_hold_ms, first_hold_ms),
            critical_section_ms: (critical_section_ms, critical_section_ms),
            downstream_ms: (0, 0),
            downstream_failure_rate: 0.0,
        }
    }
}

/// Everything a path execution needs to know: which locks in which order,
/// how long to wait for each, and how long each stage of work takes.
#[derive(Debug, Clone, PartialEq)]
pub struct PathPlan {
    pub operation: Operation,
    pub lock_order: [LockId; 2],
    pub lock_wait: Duration,
    pub fast_work: DelayRange,
    pub first_hold: DelayRange,
    pub critical_section: DelayRange,
    pub downstream: DelayRange,
    pub downstream_failure_rate: f64,
}

/// Lock order shared by the order path and the fixed inventory path.
pub const CANONICAL_ORDER: [LockId; 2] = [LockId::A, LockId::B];

impl PathPlan {
    pub fn new(operation: Operation, lock_order: [LockId; 2], timings: &PathTimings) -> Self {
        let [fast, first, critical, downstream] = match operation {
            Operation::Order => [
                "order processing",
                "order validation",
                "order commit",
                "payment gateway",
            ],
            Operation::Inventory => [
                "inventory update",
                "stock lookup",
                "stock adjustment",
                "warehouse sync",
            ],
        };

        PathPlan {
            operation,
            lock_order,
            lock_wait: Duration::from_millis(timings.lock_wait_ms),
            fast_work: DelayRange::new(fast, timings.fast_work_ms),
            first_hold: DelayRange::new(first, timings.first_hold_ms),
            critical_section: DelayRange::new(critical, timings.critical_section_ms),
            downstream: DelayRange::new(downstream, timings.downstream_ms),
            downstream_failure_rate: timings.downstream_failure_rate.clamp(0.0, 1.0),
        }
    }

    /// Order path: Lock-A then Lock-B.
    pub fn order(timings: &PathTimings) -> Self {
        Self::new(Operation::Order, CANONICAL_ORDER, timings)
    }

    /// Inventory path. Reversed (Lock-B then Lock-A) unless `consistent`,
    /// in which case it uses the order path's lock order.
    pub fn inventory(timings: &PathTimings, consistent: bool) -> Self {
        let lock_order = if consistent {
            CANONICAL_ORDER
        } else {
            [LockId::B, LockId::A]
        };
        Self::new(Operation::Inventory, lock_order, timings)
    }

    /// Whether two plans take their locks in the same order.
    pub fn shares_lock_order(&self, other: &PathPlan) -> bool {
        self.lock_order == other.lock_order
    }

    pub fn first_lock(&self) -> LockId {
        self.lock_order[0]
    }

    pub fn second_lock(&self) -> LockId {
        self.lock_order[1]
    }
}
