//! HTTP surface over a [`ServiceContext`].
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `POST /orders/process`: order path. Body `{ "orderId"? }`.
//! - `POST /inventory/update`: inventory path. Body
//!   `{ "updateId"?, "productId"?, "quantityChange"? }`.
//! - `GET /orders/metrics`, `GET /inventory/metrics`: per-path counters.
//! - `GET /metrics`: aggregate snapshot plus the classifier verdict.
//! - `GET /locks`: per-lock counters.
//! - `GET /health`: composite health report; 503 when unhealthy.
//!
//! Every route runs behind the timing middleware.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::context::ServiceContext;
use super::error::{merge_fields, ServiceError};
use super::middleware::track_request;
use crate::health::HealthStatus;
use crate::metrics::OutcomeKind;
use crate::path::{Operation, PathReport};

/// Build the axum `Router` for the given context.
pub fn router(ctx: Arc<ServiceContext>) -> Router {
    Router::new()
        .route("/orders/process", post(process_order))
        .route("/orders/metrics", get(order_metrics))
        .route("/inventory/update", post(update_inventory))
        .route("/inventory/metrics", get(inventory_metrics))
        .route("/metrics", get(metrics))
        .route("/locks", get(locks))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(ctx.clone(), track_request))
        .with_state(ctx)
}

/// Serve the context over HTTP at the given address (e.g. `"0.0.0.0:8080"`).
pub async fn serve(ctx: Arc<ServiceContext>, addr: &str) -> Result<(), std::io::Error> {
    serve_with_shutdown(ctx, addr, std::future::pending()).await
}

/// Like [`serve`], stopping gracefully once `shutdown` resolves.
pub async fn serve_with_shutdown<S>(
    ctx: Arc<ServiceContext>,
    addr: &str,
    shutdown: S,
) -> Result<(), std::io::Error>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    let app = router(ctx);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessOrder {
    order_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateInventory {
    update_id: Option<i64>,
    product_id: Option<i64>,
    quantity_change: Option<i64>,
}

/// Decode a business request body. Only an empty body means "all
/// defaults"; anything else must be valid JSON for `T`.
fn parse_input<T>(operation: Operation, body: &[u8]) -> Result<T, ServiceError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ServiceError::InvalidInput {
        operation,
        message: e.to_string(),
    })
}

/// `POST /orders/process`
async fn process_order(State(ctx): State<Arc<ServiceContext>>, body: Bytes) -> Response {
    let input: ProcessOrder = match parse_input(Operation::Order, &body) {
        Ok(input) => input,
        Err(err) => return err.into_response(),
    };
    let result = ctx.run_path(Operation::Order, input.order_id).await;
    path_response(&ctx, result, Value::Null)
}

/// `POST /inventory/update`
async fn update_inventory(State(ctx): State<Arc<ServiceContext>>, body: Bytes) -> Response {
    let input: UpdateInventory = match parse_input(Operation::Inventory, &body) {
        Ok(input) => input,
        Err(err) => return err.into_response(),
    };
    let extra = json!({
        "productId": input.product_id,
        "quantityChange": input.quantity_change,
    });
    let result = ctx.run_path(Operation::Inventory, input.update_id).await;
    path_response(&ctx, result, extra)
}

fn path_response(
    ctx: &ServiceContext,
    result: Result<PathReport, ServiceError>,
    extra: Value,
) -> Response {
    match result {
        Ok(report) => {
            let plan = ctx.plan(report.operation);
            let mut body = json!({
                "status": "Processed",
                "processingTimeMs": report.elapsed.as_millis() as u64,
                "contended": report.contended,
                "lockOrder": plan.lock_order,
            });
            body[report.operation.id_field()] = json!(report.business_id);
            merge_fields(&mut body, extra);
            let mut response = (StatusCode::OK, Json(body)).into_response();
            response.extensions_mut().insert(OutcomeKind::Success);
            response
        }
        Err(err) => err.into_response_with(extra),
    }
}

/// `GET /orders/metrics`
async fn order_metrics(State(ctx): State<Arc<ServiceContext>>) -> impl IntoResponse {
    Json(ctx.operation_stats(Operation::Order).snapshot())
}

/// `GET /inventory/metrics`
async fn inventory_metrics(State(ctx): State<Arc<ServiceContext>>) -> impl IntoResponse {
    Json(ctx.operation_stats(Operation::Inventory).snapshot())
}

/// `GET /metrics`
async fn metrics(State(ctx): State<Arc<ServiceContext>>) -> impl IntoResponse {
    Json(json!({
        "snapshot": ctx.snapshot(),
        "verdict": ctx.verdict(),
        "workerPool": ctx.workers().stats(),
        "simulateContention": ctx.simulate_contention(),
    }))
}

/// `GET /locks`
async fn locks(State(ctx): State<Arc<ServiceContext>>) -> impl IntoResponse {
    Json(ctx.locks().stats())
}

/// `GET /health`
async fn health(State(ctx): State<Arc<ServiceContext>>) -> impl IntoResponse {
    let report = ctx.health_report();
    let status = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (status, Json(report))
}
