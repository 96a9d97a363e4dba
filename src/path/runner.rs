use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::time::{sleep, Instant};

use super::{HeldLocks, Operation, PathError, PathPlan, PathState};
use crate::lock::{LockGuard, LockId, LockRegistry};

/// How a single lock acquisition ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttemptOutcome {
    Acquired,
    TimedOut,
}

/// One bounded-wait acquisition made by a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionAttempt {
    pub lock: LockId,
    /// 0 for the path's first lock, 1 for its second.
    pub position: usize,
    pub max_wait: Duration,
    pub waited: Duration,
    pub outcome: AttemptOutcome,
}

/// Result of a path execution that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathReport {
    pub operation: Operation,
    pub business_id: i64,
    pub elapsed: Duration,
    /// Whether the dual-lock protocol ran (false on the fast path).
    pub contended: bool,
    pub attempts: Vec<AcquisitionAttempt>,
    /// Locks in the order they were released.
    pub released: Vec<LockId>,
    pub transitions: Vec<PathState>,
}

/// Executes [`PathPlan`]s against a shared [`LockRegistry`].
pub struct PathRunner<'a> {
    locks: &'a LockRegistry,
    simulate_contention: bool,
}

/// What went wrong inside the locked section, before cleanup.
enum Failure {
    Lock(AcquisitionAttempt),
    Downstream(String),
}

struct Progress {
    state: PathState,
    transitions: Vec<PathState>,
    attempts: Vec<AcquisitionAttempt>,
}

impl Progress {
    fn new() -> Self {
        Progress {
            state: PathState::Idle,
            transitions: vec![PathState::Idle],
            attempts: Vec::with_capacity(2),
        }
    }

    fn enter(&mut self, plan: &PathPlan, business_id: i64, state: PathState) {
        tracing::trace!(
            operation = %plan.operation,
            business_id,
            from = ?self.state,
            to = ?state,
            "path transition"
        );
        self.state = state;
        self.transitions.push(state);
    }
}

impl<'a> PathRunner<'a> {
    pub fn new(locks: &'a LockRegistry, simulate_contention: bool) -> Self {
        PathRunner {
            locks,
            simulate_contention,
        }
    }

    /// Run one request through `plan`.
    ///
    /// With contention simulation off this only sleeps for the fast-path
    /// delay. Otherwise it takes both locks in plan order, works while
    /// holding them, and releases them in reverse order on every exit. If
    /// the returned future is dropped part way, the locks it holds are
    /// released during the drop.
    pub async fn run(&self, plan: &PathPlan, business_id: i64) -> Result<PathReport, PathError> {
        let started = Instant::now();
        let mut progress = Progress::new();

        if !self.simulate_contention {
            sleep(plan.fast_work.sample()).await;
            progress.enter(plan, business_id, PathState::Done);
            return Ok(PathReport {
                operation: plan.operation,
                business_id,
                elapsed: started.elapsed(),
                contended: false,
                attempts: Vec::new(),
                released: Vec::new(),
                transitions: progress.transitions,
            });
        }

        let mut held = HeldLocks::new();
        let result = self
            .locked_section(plan, business_id, &mut held, &mut progress)
            .await;

        progress.enter(plan, business_id, PathState::Releasing);
        let released = held.release_all();

        match result {
            Ok(()) => {
                progress.enter(plan, business_id, PathState::Done);
                Ok(PathReport {
                    operation: plan.operation,
                    business_id,
                    elapsed: started.elapsed(),
                    contended: true,
                    attempts: progress.attempts,
                    released,
                    transitions: progress.transitions,
                })
            }
            Err(Failure::Lock(attempt)) => {
                progress.enter(plan, business_id, PathState::Failed);
                let elapsed = started.elapsed();
                tracing::warn!(
                    operation = %plan.operation,
                    business_id,
                    lock = %attempt.lock,
                    position = attempt.position,
                    waited_ms = attempt.waited.as_millis() as u64,
                    ?released,
                    "lock acquisition timed out, possible deadlock"
                );
                Err(PathError::LockTimeout {
                    operation: plan.operation,
                    business_id,
                    attempt,
                    elapsed,
                })
            }
            Err(Failure::Downstream(message)) => {
                progress.enter(plan, business_id, PathState::Failed);
                Err(PathError::Unclassified {
                    operation: plan.operation,
                    business_id,
                    message,
                    elapsed: started.elapsed(),
                })
            }
        }
    }

    async fn locked_section(
        &self,
        plan: &PathPlan,
        business_id: i64,
        held: &mut HeldLocks,
        progress: &mut Progress,
    ) -> Result<(), Failure> {
        progress.enter(plan, business_id, PathState::AcquiringFirst);
        let first = self.acquire(plan, 0, progress).await?;
        held.push(first);
        progress.enter(plan, business_id, PathState::HoldingFirst);
        sleep(plan.first_hold.sample()).await;

        progress.enter(plan, business_id, PathState::AcquiringSecond);
        let second = self.acquire(plan, 1, progress).await?;
        held.push(second);
        progress.enter(plan, business_id, PathState::HoldingBoth);
        sleep(plan.critical_section.sample()).await;

        sleep(plan.downstream.sample()).await;
        if plan.downstream_failure_rate > 0.0
            && rand::thread_rng().gen_bool(plan.downstream_failure_rate)
        {
            return Err(Failure::Downstream(format!(
                "{} call failed",
                plan.downstream.label
            )));
        }
        Ok(())
    }

    async fn acquire(
        &self,
        plan: &PathPlan,
        position: usize,
        progress: &mut Progress,
    ) -> Result<LockGuard, Failure> {
        let lock = plan.lock_order[position];
        let started = Instant::now();
        let result = self.locks.try_acquire(lock, plan.lock_wait).await;

        let (outcome, waited) = match &result {
            Ok(_) => (AttemptOutcome::Acquired, started.elapsed()),
            Err(timeout) => (AttemptOutcome::TimedOut, timeout.waited),
        };
        let attempt = AcquisitionAttempt {
            lock,
            position,
            max_wait: plan.lock_wait,
            waited,
            outcome,
        };
        progress.attempts.push(attempt.clone());

        result.map_err(|_| Failure::Lock(attempt))
    }
}
