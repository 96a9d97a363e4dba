//! In-process load driver.
//!
//! Fires order and inventory requests at a [`ServiceContext`] in
//! concurrent pairs, the same shape of traffic that exposes the
//! opposite-order deadlock over HTTP, and summarizes what the metrics and
//! the classifier saw afterwards.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::health::HealthVerdict;
use crate::metrics::{MetricsSnapshot, OperationStatsSnapshot, OutcomeKind};
use crate::path::Operation;
use crate::service::ServiceContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPlan {
    /// Order/inventory pairs started together in each round.
    pub pairs: usize,
    pub rounds: usize,
}

impl Default for LoadPlan {
    fn default() -> Self {
        LoadPlan {
            pairs: 4,
            rounds: 5,
        }
    }
}

/// Request outcomes as counted by the driver itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeCounts {
    pub succeeded: u64,
    pub lock_timeouts: u64,
    pub request_timeouts: u64,
    pub errors: u64,
}

impl OutcomeCounts {
    fn add(&mut self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Success => self.succeeded += 1,
            OutcomeKind::LockTimeout => self.lock_timeouts += 1,
            OutcomeKind::RequestTimeout => self.request_timeouts += 1,
            OutcomeKind::Error => self.errors += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.succeeded + self.lock_timeouts + self.request_timeouts + self.errors
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub consistent_order: bool,
    pub simulate_contention: bool,
    pub outcomes: OutcomeCounts,
    pub elapsed_ms: u64,
    pub snapshot: MetricsSnapshot,
    pub orders: OperationStatsSnapshot,
    pub inventory: OperationStatsSnapshot,
    pub verdict: HealthVerdict,
    /// Both locks free once every request has finished.
    pub locks_free: bool,
}

/// Drive `plan` against `ctx` and wait for every request to finish.
pub async fn run_load(ctx: Arc<ServiceContext>, plan: LoadPlan) -> LoadSummary {
    let started = Instant::now();
    let mut outcomes = OutcomeCounts::default();

    for round in 0..plan.rounds {
        let mut tasks = JoinSet::new();
        for _ in 0..plan.pairs {
            for operation in [Operation::Order, Operation::Inventory] {
                let ctx = ctx.clone();
                tasks.spawn(async move { ctx.execute(operation, None).await.outcome.kind });
            }
        }

        let mut round_outcomes = OutcomeCounts::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(kind) => round_outcomes.add(kind),
                Err(e) => {
                    tracing::error!(error = %e, "load task failed");
                    round_outcomes.add(OutcomeKind::Error);
                }
            }
        }

        tracing::info!(
            round,
            succeeded = round_outcomes.succeeded,
            lock_timeouts = round_outcomes.lock_timeouts,
            request_timeouts = round_outcomes.request_timeouts,
            "round finished"
        );
        outcomes.succeeded += round_outcomes.succeeded;
        outcomes.lock_timeouts += round_outcomes.lock_timeouts;
        outcomes.request_timeouts += round_outcomes.request_timeouts;
        outcomes.errors += round_outcomes.errors;
    }

    LoadSummary {
        consistent_order: ctx
            .plan(Operation::Order)
            .shares_lock_order(ctx.plan(Operation::Inventory)),
        simulate_contention: ctx.simulate_contention(),
        outcomes,
        elapsed_ms: duration_ms(started.elapsed()),
        snapshot: ctx.snapshot(),
        orders: ctx.operation_stats(Operation::Order).snapshot(),
        inventory: ctx.operation_stats(Operation::Inventory).snapshot(),
        verdict: ctx.verdict(),
        locks_free: ctx.locks().all_free(),
    }
}

fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}
