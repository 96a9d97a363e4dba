//! Health classification.
//!
//! [`classify`] is a pure function over a metrics snapshot; the report
//! side combines it with worker-pool and memory checks into the composite
//! verdict served on `/health`.

mod classifier;
mod report;

pub use classifier::{
    classify, contention_probability, HealthRule, HealthStatus, HealthThresholds, HealthVerdict,
};
pub use report::{
    memory_check, performance_check, process_resident_bytes, timed_check, utilization_percent,
    worker_pool_check, CheckOutcome, HealthCheckResult, HealthReport,
};
