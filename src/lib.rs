//! Lock-contention laboratory.
//!
//! Two request paths take the same pair of locks. With the inventory path
//! taking them in the opposite order, concurrent requests deadlock until
//! the bounded lock wait breaks the cycle; with a shared order they never
//! do. Latency and timeout metrics are collected for every request and fed
//! to a health classifier that names the likely cause.
//!
//! - [`lock`]: named locks with bounded, cancel-safe acquisition.
//! - [`path`]: the two-lock request state machine.
//! - [`metrics`]: rolling latency window and outcome counters.
//! - [`health`]: classifier and composite health report.
//! - [`service`]: per-instance context, deadline wrapper, HTTP surface.
//! - [`simulate`]: in-process load driver.

pub mod config;
pub mod health;
pub mod lock;
pub mod metrics;
pub mod path;
pub mod service;
pub mod simulate;

pub use config::{Config, ConfigError};
pub use health::{HealthReport, HealthStatus, HealthVerdict};
pub use lock::{LockId, LockRegistry, LockTimeout};
pub use metrics::{MetricsAggregator, MetricsSnapshot, OutcomeKind};
pub use path::{Operation, PathError, PathPlan, PathRunner};
pub use service::{ServiceContext, ServiceError};
pub use simulate::{run_load, LoadPlan, LoadSummary};
