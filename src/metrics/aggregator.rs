use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use super::window::{percentile, RollingWindow, DEFAULT_WINDOW_CAPACITY};
use super::OutcomeKind;

/// Process-wide request counters plus the rolling response-time window.
///
/// Counters are plain atomics and the window has its own mutex; neither
/// touches the business locks, so recording metrics never waits on a
/// request that is stuck in the dual-lock protocol.
pub struct MetricsAggregator {
    total: AtomicU64,
    successful: AtomicU64,
    timed_out: AtomicU64,
    lock_timeouts: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicU64,
    window: RollingWindow,
}

/// Derived view of the aggregator at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub average_ms: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub timeout_requests: u64,
    pub lock_timeouts: u64,
    pub failed_requests: u64,
    pub in_flight: u64,
    /// Percentage of all requests that timed out.
    pub timeout_rate: f64,
    pub sample_count: usize,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WINDOW_CAPACITY)
    }

    pub fn with_capacity(window_capacity: usize) -> Self {
        MetricsAggregator {
            total: AtomicU64::new(0),
            successful: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            lock_timeouts: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            window: RollingWindow::new(window_capacity),
        }
    }

    /// A request has started.
    pub fn record_entry(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::AcqRel);
    }

    /// A request has finished with `kind` after `elapsed`.
    pub fn record_exit(&self, kind: OutcomeKind, elapsed: Duration) {
        // Saturating so an unpaired exit cannot wrap the gauge.
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            });

        let counter = match kind {
            OutcomeKind::Success => Some(&self.successful),
            OutcomeKind::LockTimeout => Some(&self.lock_timeouts),
            OutcomeKind::RequestTimeout => None,
            OutcomeKind::Error => Some(&self.failed),
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        if kind.is_timeout() {
            self.timed_out.fetch_add(1, Ordering::Relaxed);
        }

        self.window.push(elapsed.as_millis() as u64);
    }

    /// Record entry and return a guard that records the exit.
    ///
    /// If the guard is dropped without [`InFlight::finish`] (the request
    /// future was cancelled) the exit is recorded as a request timeout.
    pub fn begin(self: &Arc<Self>) -> InFlight {
        self.record_entry();
        InFlight {
            metrics: self.clone(),
            started: Instant::now(),
            finished: false,
        }
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn total_requests(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut samples = self.window.snapshot();
        samples.sort_unstable();

        let total = self.total.load(Ordering::Relaxed);
        let timed_out = self.timed_out.load(Ordering::Relaxed);

        let average_ms = if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<u64>() as f64 / samples.len() as f64
        };

        MetricsSnapshot {
            p50_ms: percentile(&samples, 0.50),
            p95_ms: percentile(&samples, 0.95),
            p99_ms: percentile(&samples, 0.99),
            average_ms,
            total_requests: total,
            successful_requests: self.successful.load(Ordering::Relaxed),
            timeout_requests: timed_out,
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            failed_requests: self.failed.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
            timeout_rate: rate(timed_out, total),
            sample_count: samples.len(),
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// `part / whole` as a percentage, 0 when `whole` is 0.
pub fn rate(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// An in-flight request registered with a [`MetricsAggregator`].
pub struct InFlight {
    metrics: Arc<MetricsAggregator>,
    started: Instant,
    finished: bool,
}

impl InFlight {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record the exit and return the elapsed time that was recorded.
    pub fn finish(mut self, kind: OutcomeKind) -> Duration {
        let elapsed = self.started.elapsed();
        self.metrics.record_exit(kind, elapsed);
        self.finished = true;
        elapsed
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.finished {
            let elapsed = self.started.elapsed();
            tracing::debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                "request dropped before completion"
            );
            self.metrics
                .record_exit(OutcomeKind::RequestTimeout, elapsed);
        }
    }
}
