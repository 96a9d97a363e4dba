use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

use crate::health::utilization_percent;

/// Bounded pool of request workers.
///
/// Business requests take a worker for the whole path execution, so
/// requests stuck waiting on a lock keep their worker busy and show up as
/// rising utilization. Requests beyond capacity queue for a worker.
pub struct WorkerPool {
    capacity: usize,
    permits: Arc<Semaphore>,
    busy: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPoolStats {
    pub max_workers: usize,
    pub busy_workers: usize,
    pub queued_requests: usize,
    pub utilization_percent: f64,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        WorkerPool {
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
            busy: Arc::new(AtomicUsize::new(0)),
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a free worker.
    pub async fn acquire(&self) -> Result<WorkerPermit, AcquireError> {
        let _queued = Gauge::raise(&self.queued);
        let permit = self.permits.clone().acquire_owned().await?;
        self.busy.fetch_add(1, Ordering::AcqRel);
        Ok(WorkerPermit {
            _permit: permit,
            busy: self.busy.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn busy(&self) -> usize {
        self.busy.load(Ordering::Acquire)
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Busy workers as a percentage of capacity.
    pub fn utilization(&self) -> f64 {
        utilization_percent(self.busy(), self.capacity)
    }

    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            max_workers: self.capacity,
            busy_workers: self.busy(),
            queued_requests: self.queued(),
            utilization_percent: self.utilization(),
        }
    }
}

/// A worker taken from a [`WorkerPool`]; returned on drop.
pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
    busy: Arc<AtomicUsize>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        self.busy.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Increments a gauge for as long as it lives.
struct Gauge<'a>(&'a AtomicUsize);

impl<'a> Gauge<'a> {
    fn raise(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Gauge(counter)
    }
}

impl Drop for Gauge<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
