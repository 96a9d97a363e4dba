use std::time::Duration;

use thiserror::Error;

use super::LockId;

/// The bounded wait elapsed before the lock became free.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("timed out after {}ms waiting for {lock}", waited.as_millis())]
pub struct LockTimeout {
    pub lock: LockId,
    pub waited: Duration,
}

/// A release was attempted by a guard that is not the recorded holder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{lock} released by non-holder (holder token {holder}, releaser {releaser})")]
pub struct ReleaseViolation {
    pub lock: LockId,
    pub holder: u64,
    pub releaser: u64,
}
