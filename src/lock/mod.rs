//! Dual-lock resource guard.
//!
//! Two named locks, Lock-A and Lock-B, acquired with a bounded wait and
//! released through scoped guards. Callers decide what a failed
//! acquisition means; nothing here retries.

mod error;
#[allow(clippy::module_inception)]
mod lock;
mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use error::{LockTimeout, ReleaseViolation};
pub use lock::{LockGuard, LockStats, ResourceLock};
pub use registry::LockRegistry;

/// Identity of one of the two business locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockId {
    #[serde(rename = "Lock-A")]
    A,
    #[serde(rename = "Lock-B")]
    B,
}

impl LockId {
    pub const ALL: [LockId; 2] = [LockId::A, LockId::B];

    pub fn name(self) -> &'static str {
        match self {
            LockId::A => "Lock-A",
            LockId::B => "Lock-B",
        }
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
