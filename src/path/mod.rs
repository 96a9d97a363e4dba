//! Request paths that take the two business locks.
//!
//! Order and inventory run the same state machine. They differ only in the
//! [`PathPlan`] they are given: the lock order and the labelled work delays.
//! Giving inventory the order path's lock order is what removes the
//! circular wait.

mod error;
mod held;
mod plan;
mod runner;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use error::PathError;
pub use held::HeldLocks;
pub use plan::{DelayRange, PathPlan, PathTimings};
pub use runner::{AcquisitionAttempt, AttemptOutcome, PathReport, PathRunner};

/// The logical operation a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Order,
    Inventory,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Order => "order",
            Operation::Inventory => "inventory",
        }
    }

    /// JSON field carrying the business identifier in responses.
    pub fn id_field(self) -> &'static str {
        match self {
            Operation::Order => "orderId",
            Operation::Inventory => "updateId",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// States of one path execution.
///
/// `Releasing` is entered on every exit from the locked section, success
/// or failure, and always before `Done` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PathState {
    Idle,
    AcquiringFirst,
    HoldingFirst,
    AcquiringSecond,
    HoldingBoth,
    Releasing,
    Done,
    Failed,
}
