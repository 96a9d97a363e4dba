//! Request timing layer.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::context::ServiceContext;
use super::error::ServiceError;
use super::timing::timed;
use crate::metrics::OutcomeKind;
use crate::path::Operation;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const RESPONSE_TIME_HEADER: &str = "x-response-time-ms";

/// Wraps every request: enforces the outer deadline and stamps the
/// response with the request id and elapsed time. Business requests are
/// also recorded in the aggregate metrics.
pub async fn track_request(
    State(ctx): State<Arc<ServiceContext>>,
    request: Request,
    next: Next,
) -> Response {
    let operation = operation_for(request.uri().path());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let limit = ctx.request_timeout();

    // Health and metrics polling stays out of the aggregate counters.
    let metrics = operation.map(|_| ctx.metrics());
    let timed = timed(metrics, limit, operation, outcome_of, next.run(request)).await;

    let outcome = timed.outcome;
    let mut response = match timed.value {
        Some(response) => response,
        None => {
            tracing::warn!(
                %method,
                path = %path,
                request_id = %outcome.request_id,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "request timed out"
            );
            ServiceError::RequestTimeout {
                operation,
                limit,
                elapsed: outcome.elapsed,
            }
            .into_response()
        }
    };

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&outcome.request_id.to_string()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    headers.insert(
        RESPONSE_TIME_HEADER,
        HeaderValue::from(outcome.elapsed.as_millis() as u64),
    );
    response
}

/// Outcome a handler attached to the response, or one guessed from the
/// status code.
fn outcome_of(response: &Response) -> OutcomeKind {
    response
        .extensions()
        .get::<OutcomeKind>()
        .copied()
        .unwrap_or_else(|| OutcomeKind::from_status(response.status().as_u16()))
}

fn operation_for(path: &str) -> Option<Operation> {
    if path.starts_with("/orders/process") {
        Some(Operation::Order)
    } else if path.starts_with("/inventory/update") {
        Some(Operation::Inventory)
    } else {
        None
    }
}
