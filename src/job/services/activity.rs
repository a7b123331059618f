//! Per-job activity counters.

use crate::job::domain::JobId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Counts in-flight work per job and wakes waiters when a count drops.
#[derive(Debug, Default)]
pub(crate) struct ActivityTracker {
    counts: Mutex<HashMap<JobId, usize>>,
    settled: Notify,
}

impl ActivityTracker {
    pub(crate) fn acquire(&self, job_id: JobId) {
        let mut counts = self.lock();
        let count = counts.entry(job_id).or_default();
        *count = count.saturating_add(1);
    }

    pub(crate) fn release(&self, job_id: JobId) {
        {
            let mut counts = self.lock();
            let remaining = counts
                .get(&job_id)
                .map_or(0, |count| count.saturating_sub(1));
            if remaining == 0 {
                counts.remove(&job_id);
            } else {
                counts.insert(job_id, remaining);
            }
        }
        self.settled.notify_waiters();
    }

    pub(crate) fn is_active(&self, job_id: JobId) -> bool {
        self.lock().contains_key(&job_id)
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.lock().is_empty()
    }

    /// Acquires a slot and returns a guard that releases it.
    pub(crate) fn track(self: &Arc<Self>, job_id: JobId) -> ActivityGuard {
        self.acquire(job_id);
        self.adopt(job_id)
    }

    /// Wraps a slot acquired earlier, for example at enqueue time.
    pub(crate) fn adopt(self: &Arc<Self>, job_id: JobId) -> ActivityGuard {
        ActivityGuard {
            tracker: Arc::clone(self),
            job_id,
        }
    }

    pub(crate) const fn settled(&self) -> &Notify {
        &self.settled
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, usize>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases one activity slot when dropped.
#[derive(Debug)]
pub(crate) struct ActivityGuard {
    tracker: Arc<ActivityTracker>,
    job_id: JobId,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.tracker.release(self.job_id);
    }
}
