use std::sync::Arc;

use contention_lab::path::PathTimings;
use contention_lab::{Config, ServiceContext};

/// Context running the dual-lock protocol with fixed stage delays.
pub fn contended(consistent: bool, timings: PathTimings) -> Arc<ServiceContext> {
    Arc::new(ServiceContext::new(Config {
        enable_deadlock_simulation: true,
        use_consistent_lock_order: consistent,
        path_timings: timings,
        ..Config::default()
    }))
}

pub fn fast_path() -> Arc<ServiceContext> {
    Arc::new(ServiceContext::new(Config::default()))
}

/// Bind to port 0 and return the base URL.
#[cfg(feature = "http")]
pub async fn start_server(ctx: Arc<ServiceContext>) -> String {
    let app = contention_lab::service::router(ctx);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
