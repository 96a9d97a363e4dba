//! Error type for the request surface.

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

use crate::metrics::OutcomeKind;
use crate::path::{Operation, PathError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The path gave up on a lock or failed inside its locked section.
    #[error(transparent)]
    Path(#[from] PathError),
    /// The outer per-request deadline fired.
    #[error("request exceeded its {}ms deadline", .limit.as_millis())]
    RequestTimeout {
        operation: Option<Operation>,
        limit: Duration,
        elapsed: Duration,
    },
    /// No worker could be taken from the pool.
    #[error("worker pool is shut down")]
    PoolClosed { operation: Operation },
    /// The request body was present but not a valid request.
    #[error("invalid {operation} request: {message}")]
    InvalidInput {
        operation: Operation,
        message: String,
    },
}

impl ServiceError {
    /// Map this error to an HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Path(PathError::LockTimeout { .. }) => 408,
            ServiceError::RequestTimeout { .. } => 408,
            ServiceError::Path(PathError::Unclassified { .. }) => 500,
            ServiceError::PoolClosed { .. } => 500,
            ServiceError::InvalidInput { .. } => 400,
        }
    }

    pub fn outcome(&self) -> OutcomeKind {
        match self {
            ServiceError::Path(PathError::LockTimeout { .. }) => OutcomeKind::LockTimeout,
            ServiceError::RequestTimeout { .. } => OutcomeKind::RequestTimeout,
            ServiceError::Path(PathError::Unclassified { .. })
            | ServiceError::PoolClosed { .. }
            | ServiceError::InvalidInput { .. } => OutcomeKind::Error,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            ServiceError::Path(e) => e.elapsed(),
            ServiceError::RequestTimeout { elapsed, .. } => *elapsed,
            ServiceError::PoolClosed { .. } | ServiceError::InvalidInput { .. } => Duration::ZERO,
        }
    }

    /// JSON body; always carries the elapsed processing time.
    pub fn body(&self) -> Value {
        let status = if self.status_code() == 408 {
            "Timeout"
        } else {
            "Error"
        };
        let mut body = json!({
            "status": status,
            "message": self.to_string(),
            "processingTimeMs": self.elapsed().as_millis() as u64,
        });

        match self {
            ServiceError::Path(e) => {
                body[e.operation().id_field()] = json!(e.business_id());
                if let PathError::LockTimeout { attempt, .. } = e {
                    body["lock"] = json!(attempt.lock);
                    body["waitedMs"] = json!(attempt.waited.as_millis() as u64);
                }
            }
            ServiceError::RequestTimeout { limit, .. } => {
                body["deadlineMs"] = json!(limit.as_millis() as u64);
            }
            ServiceError::PoolClosed { .. } | ServiceError::InvalidInput { .. } => {}
        }
        body
    }

    /// HTTP response carrying [`body`](Self::body) plus the non-null
    /// fields of `extra`, tagged with this error's outcome.
    #[cfg(feature = "http")]
    pub fn into_response_with(self, extra: Value) -> axum::response::Response {
        use axum::response::IntoResponse;

        let status = axum::http::StatusCode::from_u16(self.status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        let mut body = self.body();
        merge_fields(&mut body, extra);
        let mut response = (status, axum::Json(body)).into_response();
        response.extensions_mut().insert(self.outcome());
        response
    }
}

/// Copy the non-null top-level fields of `extra` into `body`.
#[cfg(any(feature = "http", test))]
pub(crate) fn merge_fields(body: &mut Value, extra: Value) {
    if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
        for (key, value) in extra {
            if !value.is_null() {
                body.insert(key, value);
            }
        }
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        self.into_response_with(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockId;
    use crate::path::{AcquisitionAttempt, AttemptOutcome};

    fn lock_timeout() -> ServiceError {
        ServiceError::Path(PathError::LockTimeout {
            operation: Operation::Inventory,
            business_id: 9,
            attempt: AcquisitionAttempt {
                lock: LockId::A,
                position: 1,
                max_wait: Duration::from_millis(100),
                waited: Duration::from_millis(101),
                outcome: AttemptOutcome::TimedOut,
            },
            elapsed: Duration::from_millis(180),
        })
    }

    #[test]
    fn lock_timeout_is_408_with_lock_name() {
        let err = lock_timeout();
        assert_eq!(err.status_code(), 408);
        assert_eq!(err.outcome(), OutcomeKind::LockTimeout);

        let body = err.body();
        assert_eq!(body["status"], "Timeout");
        assert_eq!(body["updateId"], 9);
        assert_eq!(body["lock"], "Lock-A");
        assert_eq!(body["processingTimeMs"], 180);
    }

    #[test]
    fn unclassified_is_500() {
        let err = ServiceError::Path(PathError::Unclassified {
            operation: Operation::Order,
            business_id: 3,
            message: "payment gateway call failed".into(),
            elapsed: Duration::from_millis(12),
        });
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.outcome(), OutcomeKind::Error);
        let body = err.body();
        assert_eq!(body["status"], "Error");
        assert_eq!(body["orderId"], 3);
        assert_eq!(body["processingTimeMs"], 12);
    }

    #[test]
    fn request_timeout_reports_deadline() {
        let err = ServiceError::RequestTimeout {
            operation: None,
            limit: Duration::from_millis(7500),
            elapsed: Duration::from_millis(7502),
        };
        assert_eq!(err.status_code(), 408);
        assert_eq!(err.outcome(), OutcomeKind::RequestTimeout);
        let body = err.body();
        assert_eq!(body["deadlineMs"], 7500);
        assert_eq!(body["processingTimeMs"], 7502);
    }

    #[test]
    fn invalid_input_is_400() {
        let err = ServiceError::InvalidInput {
            operation: Operation::Order,
            message: "invalid type: string \"abc\", expected i64".into(),
        };
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.outcome(), OutcomeKind::Error);
        let body = err.body();
        assert_eq!(body["status"], "Error");
        assert_eq!(body["processingTimeMs"], 0);
        assert!(body["message"].as_str().unwrap().starts_with("invalid order request"));
    }

    #[test]
    fn merge_skips_nulls_and_overrides_fields() {
        let mut body = json!({ "status": "Timeout", "updateId": 4 });
        merge_fields(
            &mut body,
            json!({ "productId": 55, "quantityChange": null, "updateId": 5 }),
        );
        assert_eq!(body["productId"], 55);
        assert_eq!(body["updateId"], 5);
        assert!(body.get("quantityChange").is_none());

        merge_fields(&mut body, Value::Null);
        assert_eq!(body["status"], "Timeout");
    }

    #[cfg(feature = "http")]
    #[test]
    fn response_carries_extra_fields_and_outcome() {
        let response = lock_timeout().into_response_with(json!({ "productId": 55 }));
        assert_eq!(response.status().as_u16(), 408);
        assert_eq!(
            response.extensions().get::<OutcomeKind>(),
            Some(&OutcomeKind::LockTimeout)
        );
    }
}
