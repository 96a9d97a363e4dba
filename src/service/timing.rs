use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::metrics::{MetricsAggregator, OutcomeKind, RequestOutcome};
use crate::path::Operation;

/// A request run under [`timed`].
#[derive(Debug)]
pub struct Timed<T> {
    pub outcome: RequestOutcome,
    /// `None` when the deadline fired and the request was cancelled.
    pub value: Option<T>,
}

/// Run one request under the outer deadline.
///
/// Races `request` against `limit` and classifies a finished request with
/// `classify`. When `metrics` is given the request is registered as in
/// flight and its outcome folded in; otherwise it is only timed. When the
/// deadline wins, `request` is dropped, which runs its lock cleanup,
/// before the timeout is recorded.
pub async fn timed<F, T, C>(
    metrics: Option<&Arc<MetricsAggregator>>,
    limit: Duration,
    operation: Option<Operation>,
    classify: C,
    request: F,
) -> Timed<T>
where
    F: Future<Output = T>,
    C: FnOnce(&T) -> OutcomeKind,
{
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        %request_id,
        operation = operation.map(Operation::name).unwrap_or("-"),
    );

    async move {
        let started = Instant::now();
        let in_flight = metrics.map(|metrics| metrics.begin());
        let finish = |kind: OutcomeKind| match in_flight {
            Some(in_flight) => in_flight.finish(kind),
            None => started.elapsed(),
        };

        match tokio::time::timeout(limit, request).await {
            Ok(value) => {
                let kind = classify(&value);
                let elapsed = finish(kind);
                tracing::debug!(?kind, elapsed_ms = elapsed.as_millis() as u64, "request finished");
                Timed {
                    outcome: RequestOutcome {
                        request_id,
                        operation,
                        elapsed,
                        kind,
                    },
                    value: Some(value),
                }
            }
            Err(_) => {
                let elapsed = finish(OutcomeKind::RequestTimeout);
                tracing::warn!(
                    limit_ms = limit.as_millis() as u64,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "request cancelled at deadline"
                );
                Timed {
                    outcome: RequestOutcome {
                        request_id,
                        operation,
                        elapsed,
                        kind: OutcomeKind::RequestTimeout,
                    },
                    value: None,
                }
            }
        }
    }
    .instrument(span)
    .await
}
