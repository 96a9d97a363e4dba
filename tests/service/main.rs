//! Service integration tests.
//!
//! - In-process execution through `ServiceContext`
//! - Full axum HTTP roundtrips with a reqwest client

mod support;
mod context;
#[cfg(feature = "http")]
mod http;
