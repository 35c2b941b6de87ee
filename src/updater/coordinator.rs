//! Process-wide single-run lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Allows at most one updater run at a time. Cloning shares the same lock.
#[derive(Debug, Clone, Default)]
pub struct RunCoordinator {
    running: Arc<AtomicBool>,
}

/// Held for the lifetime of a run. Dropping it releases the lock.
#[derive(Debug)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

impl RunCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock if no run is active. Never waits.
    pub fn try_acquire(&self) -> Option<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
