use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::path::Operation;

/// Terminal state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OutcomeKind {
    Success,
    /// A bounded lock wait elapsed inside the request path.
    LockTimeout,
    /// The outer per-request deadline fired and the request was cancelled.
    RequestTimeout,
    Error,
}

impl OutcomeKind {
    pub fn is_timeout(self) -> bool {
        matches!(self, OutcomeKind::LockTimeout | OutcomeKind::RequestTimeout)
    }

    /// Best-effort outcome for a response that carries no explicit one.
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => OutcomeKind::Success,
            408 => OutcomeKind::RequestTimeout,
            _ => OutcomeKind::Error,
        }
    }
}

/// A finished request, ready to be folded into the aggregate counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub request_id: Uuid,
    pub operation: Option<Operation>,
    pub elapsed: Duration,
    pub kind: OutcomeKind,
}
