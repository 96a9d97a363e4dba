use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use super::{LockId, LockTimeout, ReleaseViolation};

/// Holder token meaning "nobody holds the lock".
const NO_HOLDER: u64 = 0;

/// Bookkeeping shared between a lock and the guards it hands out.
#[derive(Default)]
struct LockState {
    holder: AtomicU64,
    next_token: AtomicU64,
    acquisitions: AtomicU64,
    timeouts: AtomicU64,
    total_wait_us: AtomicU64,
    max_wait_us: AtomicU64,
    release_violations: AtomicU64,
}

impl LockState {
    fn record_wait(&self, waited: Duration) {
        let us = waited.as_micros() as u64;
        self.total_wait_us.fetch_add(us, Ordering::Relaxed);
        self.max_wait_us.fetch_max(us, Ordering::Relaxed);
    }
}

/// Point-in-time view of a lock's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStats {
    pub lock: LockId,
    pub held: bool,
    pub acquisitions: u64,
    pub timeouts: u64,
    pub total_wait_us: u64,
    pub max_wait_us: u64,
    pub release_violations: u64,
}

/// A named mutual-exclusion lock acquired with a bounded wait.
///
/// Waiting parks the calling task, not a thread. The wait is cancelled if
/// the acquiring future is dropped, so a cancelled request never ends up
/// holding the lock.
///
/// Every successful acquisition gets a fresh holder token. The token is
/// recorded on the lock and checked again at release time, so a release
/// by anything other than the current holder is detected and counted
/// instead of silently unlocking someone else's critical section.
pub struct ResourceLock {
    id: LockId,
    inner: Arc<Mutex<()>>,
    state: Arc<LockState>,
}

impl ResourceLock {
    pub fn new(id: LockId) -> Self {
        ResourceLock {
            id,
            inner: Arc::new(Mutex::new(())),
            state: Arc::new(LockState::default()),
        }
    }

    pub fn id(&self) -> LockId {
        self.id
    }

    /// Try to take the lock, giving up after `max_wait`.
    ///
    /// A zero `max_wait` makes this a plain non-blocking attempt. On timeout
    /// nothing is held and the lock is left untouched.
    pub async fn try_acquire(&self, max_wait: Duration) -> Result<LockGuard, LockTimeout> {
        let started = Instant::now();

        let guard = match self.inner.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) if max_wait.is_zero() => return Err(self.timed_out(started)),
            Err(_) => {
                match tokio::time::timeout(max_wait, self.inner.clone().lock_owned()).await {
                    Ok(guard) => guard,
                    Err(_) => return Err(self.timed_out(started)),
                }
            }
        };

        let waited = started.elapsed();
        self.state.record_wait(waited);
        self.state.acquisitions.fetch_add(1, Ordering::Relaxed);

        let token = self.state.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        let previous = self.state.holder.swap(token, Ordering::AcqRel);
        if previous != NO_HOLDER {
            self.state.release_violations.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                lock = %self.id,
                stale_holder = previous,
                "lock acquired while holder flag was still set"
            );
        }

        tracing::trace!(lock = %self.id, token, waited_us = waited.as_micros() as u64, "lock acquired");

        Ok(LockGuard {
            lock: self.id,
            token,
            state: self.state.clone(),
            guard: Some(guard),
            acquired_at: Instant::now(),
        })
    }

    /// Whether some guard currently holds this lock.
    pub fn is_held(&self) -> bool {
        self.state.holder.load(Ordering::Acquire) != NO_HOLDER
    }

    pub fn stats(&self) -> LockStats {
        LockStats {
            lock: self.id,
            held: self.is_held(),
            acquisitions: self.state.acquisitions.load(Ordering::Relaxed),
            timeouts: self.state.timeouts.load(Ordering::Relaxed),
            total_wait_us: self.state.total_wait_us.load(Ordering::Relaxed),
            max_wait_us: self.state.max_wait_us.load(Ordering::Relaxed),
            release_violations: self.state.release_violations.load(Ordering::Relaxed),
        }
    }

    fn timed_out(&self, started: Instant) -> LockTimeout {
        let waited = started.elapsed();
        self.state.record_wait(waited);
        self.state.timeouts.fetch_add(1, Ordering::Relaxed);
        LockTimeout {
            lock: self.id,
            waited,
        }
    }
}

/// Proof of holding a [`ResourceLock`].
///
/// Releasing consumes the guard. Dropping an unreleased guard releases it
/// too, which is what keeps cancelled and failed requests from leaking a
/// held lock.
pub struct LockGuard {
    lock: LockId,
    token: u64,
    state: Arc<LockState>,
    guard: Option<OwnedMutexGuard<()>>,
    acquired_at: Instant,
}

impl LockGuard {
    pub fn lock(&self) -> LockId {
        self.lock
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Release the lock.
    pub fn release(mut self) -> Result<(), ReleaseViolation> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), ReleaseViolation> {
        let Some(guard) = self.guard.take() else {
            return Ok(());
        };

        // Clear the holder flag before unlocking so the next acquirer
        // always finds it empty.
        let result = match self.state.holder.compare_exchange(
            self.token,
            NO_HOLDER,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(actual) => {
                self.state.release_violations.fetch_add(1, Ordering::Relaxed);
                Err(ReleaseViolation {
                    lock: self.lock,
                    holder: actual,
                    releaser: self.token,
                })
            }
        };
        drop(guard);

        tracing::trace!(
            lock = %self.lock,
            token = self.token,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "lock released"
        );
        result
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            tracing::error!(error = %e, "lock release on drop failed accounting check");
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock", &self.lock)
            .field("token", &self.token)
            .field("released", &self.guard.is_none())
            .finish()
    }
}
