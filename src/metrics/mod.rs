//! Request metrics: aggregate counters, the rolling response-time window,
//! and per-path stats.

mod aggregator;
mod operation;
mod outcome;
mod window;

pub use aggregator::{rate, InFlight, MetricsAggregator, MetricsSnapshot};
pub use operation::{OperationMetrics, OperationStats, OperationStatsSnapshot, OperationTracker};
pub use outcome::{OutcomeKind, RequestOutcome};
pub use window::{percentile, RollingWindow, DEFAULT_WINDOW_CAPACITY};
