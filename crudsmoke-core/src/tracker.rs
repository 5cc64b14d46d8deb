use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Counts outstanding units of work, including units registered while the run is
/// already in progress, and lets a waiter block until the count reaches zero.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    outstanding: AtomicUsize,
    idle: Notify,
}

/// Units registered with a [`CompletionTracker`].
///
/// Units still held when the guard is dropped are released, so a cancelled or
/// panicking unit of work never keeps the tracker above zero.
#[derive(Debug)]
#[must_use = "dropping the guard immediately completes its units"]
pub struct WorkGuard {
    tracker: Arc<CompletionTracker>,
    remaining: usize,
}

impl CompletionTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(self: &Arc<Self>, units: usize) -> WorkGuard {
        self.outstanding.fetch_add(units, Ordering::AcqRel);
        WorkGuard {
            tracker: self.clone(),
            remaining: units,
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Resolves once no registered unit is outstanding.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a release between the check and the
            // await still wakes us.
            notified.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self, units: usize) {
        if units == 0 {
            return;
        }
        let prev = self.outstanding.fetch_sub(units, Ordering::AcqRel);
        if prev == units {
            self.idle.notify_waiters();
        }
    }
}

impl WorkGuard {
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Marks one unit as finished.
    pub fn complete_one(&mut self) {
        if self.remaining == 0 {
            return;
        }
        self.remaining -= 1;
        self.tracker.release(1);
    }

    /// Moves up to `units` of this guard's units into a new guard.
    pub fn split(&mut self, units: usize) -> WorkGuard {
        let units = units.min(self.remaining);
        self.remaining -= units;
        WorkGuard {
            tracker: self.tracker.clone(),
            remaining: units,
        }
    }
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        self.tracker.release(self.remaining);
    }
}
