use std::time::Duration;

use thiserror::Error;

use super::{AcquisitionAttempt, Operation};

/// Why a path execution did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// A bounded lock wait elapsed. Every lock taken before it has been
    /// released by the time this is returned.
    #[error(
        "{operation} {business_id}: timed out acquiring {} after {}ms",
        .attempt.lock,
        .attempt.waited.as_millis()
    )]
    LockTimeout {
        operation: Operation,
        business_id: i64,
        attempt: AcquisitionAttempt,
        elapsed: Duration,
    },
    /// Anything else that went wrong inside the path.
    #[error("{operation} {business_id}: {message}")]
    Unclassified {
        operation: Operation,
        business_id: i64,
        message: String,
        elapsed: Duration,
    },
}

impl PathError {
    pub fn operation(&self) -> Operation {
        match self {
            PathError::LockTimeout { operation, .. } | PathError::Unclassified { operation, .. } => {
                *operation
            }
        }
    }

    pub fn business_id(&self) -> i64 {
        match self {
            PathError::LockTimeout { business_id, .. }
            | PathError::Unclassified { business_id, .. } => *business_id,
        }
    }

    /// Time spent in the path before it gave up.
    pub fn elapsed(&self) -> Duration {
        match self {
            PathError::LockTimeout { elapsed, .. } | PathError::Unclassified { elapsed, .. } => {
                *elapsed
            }
        }
    }
}
