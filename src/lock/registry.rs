use std::time::Duration;

use super::{LockGuard, LockId, LockStats, LockTimeout, ResourceLock};

/// The two business locks shared by every request.
///
/// One registry is built per service instance and handed to the request
/// paths by reference, so independent instances (e.g. one per test) never
/// share lock state.
pub struct LockRegistry {
    lock_a: ResourceLock,
    lock_b: ResourceLock,
}

impl LockRegistry {
    pub fn new() -> Self {
        LockRegistry {
            lock_a: ResourceLock::new(LockId::A),
            lock_b: ResourceLock::new(LockId::B),
        }
    }

    /// Get the lock for the given identifier.
    pub fn get(&self, id: LockId) -> &ResourceLock {
        match id {
            LockId::A => &self.lock_a,
            LockId::B => &self.lock_b,
        }
    }

    /// Shorthand for `get(id).try_acquire(max_wait)`.
    pub async fn try_acquire(&self, id: LockId, max_wait: Duration) -> Result<LockGuard, LockTimeout> {
        self.get(id).try_acquire(max_wait).await
    }

    /// True when neither lock is held.
    pub fn all_free(&self) -> bool {
        LockId::ALL.iter().all(|id| !self.get(*id).is_held())
    }

    pub fn stats(&self) -> Vec<LockStats> {
        LockId::ALL.iter().map(|id| self.get(*id).stats()).collect()
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
