//! Request handling around the path runner.
//!
//! [`ServiceContext`] owns one service instance: the lock registry, the
//! metrics, and the worker pool. [`timed`] is the per-request deadline
//! and accounting wrapper; with the `http` feature, [`router`] exposes the
//! context over axum behind the same wrapper.
//!
//! ```ignore
//! use std::sync::Arc;
//! use contention_lab::{Config, ServiceContext};
//!
//! let ctx = Arc::new(ServiceContext::new(Config::default()));
//! contention_lab::service::serve(ctx, "0.0.0.0:8080").await?;
//! ```

mod context;
mod error;
#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
mod middleware;
mod pool;
mod timing;

pub use context::ServiceContext;
pub use error::ServiceError;
#[cfg(feature = "http")]
pub use http::{router, serve, serve_with_shutdown};
#[cfg(feature = "http")]
pub use middleware::{REQUEST_ID_HEADER, RESPONSE_TIME_HEADER};
pub use pool::{WorkerPermit, WorkerPool, WorkerPoolStats};
pub use timing::{timed, Timed};
