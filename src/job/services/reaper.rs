//! Detection of jobs stuck in `Running` past the job timeout.

use crate::job::domain::{Job, JobStatus};
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Returns the running jobs whose start lies more than `timeout` before
/// `now`.
///
/// A timeout too large for `chrono` never expires anything.
pub(crate) fn expired_jobs(jobs: &[Job], now: DateTime<Utc>, timeout: Duration) -> Vec<&Job> {
    let Ok(limit) = TimeDelta::from_std(timeout) else {
        return Vec::new();
    };
    jobs.iter()
        .filter(|job| job.status() == JobStatus::Running)
        .filter(|job| {
            job.started_at()
                .and_then(|started| started.checked_add_signed(limit))
                .is_some_and(|deadline| deadline < now)
        })
        .collect()
}

/// Failure message recorded on a reaped job.
pub(crate) fn timeout_message(timeout: Duration) -> String {
    format!("job exceeded timeout of {timeout:?}")
}
