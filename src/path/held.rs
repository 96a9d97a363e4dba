use crate::lock::{LockGuard, LockId};

/// The locks one path execution currently holds, in acquisition order.
///
/// Releasing pops from the top, so locks always come back in reverse
/// order. Dropping the stack releases whatever is left the same way; that
/// is the cleanup a cancelled request gets.
#[derive(Debug, Default)]
pub struct HeldLocks {
    guards: Vec<LockGuard>,
}

impl HeldLocks {
    pub fn new() -> Self {
        HeldLocks {
            guards: Vec::with_capacity(2),
        }
    }

    pub fn push(&mut self, guard: LockGuard) {
        self.guards.push(guard);
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    pub fn locks(&self) -> Vec<LockId> {
        self.guards.iter().map(LockGuard::lock).collect()
    }

    /// Release everything held, last acquired first. Returns the locks in
    /// the order they were released.
    pub fn release_all(&mut self) -> Vec<LockId> {
        let mut released = Vec::with_capacity(self.guards.len());
        while let Some(guard) = self.guards.pop() {
            let lock = guard.lock();
            if let Err(e) = guard.release() {
                tracing::error!(error = %e, "release accounting check failed");
            }
            released.push(lock);
        }
        released
    }
}

impl Drop for HeldLocks {
    fn drop(&mut self) {
        if !self.guards.is_empty() {
            let released = self.release_all();
            tracing::debug!(?released, "released locks of an abandoned path");
        }
    }
}
