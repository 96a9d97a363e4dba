use std::collections::VecDeque;

use parking_lot::Mutex;

/// Default number of response-time samples kept.
pub const DEFAULT_WINDOW_CAPACITY: usize = 1000;

/// Bounded FIFO of recent response-time samples in milliseconds.
///
/// Writers hold the inner mutex only for a push (and at most one pop);
/// readers copy the contents out and do any sorting on their own copy.
pub struct RollingWindow {
    capacity: usize,
    samples: Mutex<VecDeque<u64>>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        RollingWindow {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn push(&self, sample_ms: u64) {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample_ms);
    }

    /// Copy of the current samples, oldest first.
    pub fn snapshot(&self) -> Vec<u64> {
        self.samples.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

/// Nearest-rank percentile over an ascending slice.
///
/// Picks index `ceil(pct * n) - 1`, clamped to the slice. Returns 0 for an
/// empty slice. `pct` is a fraction (0.95 for p95); it is rounded to basis
/// points so the rank is computed in integers.
pub fn percentile(sorted: &[u64], pct: f64) -> u64 {
    let n = sorted.len() as u64;
    if n == 0 {
        return 0;
    }
    let basis_points = (pct.clamp(0.0, 1.0) * 10_000.0).round() as u64;
    let rank = (basis_points * n).div_ceil(10_000);
    let index = rank.saturating_sub(1).min(n - 1);
    sorted[index as usize]
}
