//! Terminal job event delivered to notifiers.

use crate::job::domain::{Job, JobId, JobKind, JobStatus};
use chrono::{DateTime, Utc};

/// Snapshot of a job that reached a terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNotification {
    /// Job identifier.
    pub job_id: JobId,
    /// Review or report.
    pub kind: JobKind,
    /// Terminal status.
    pub status: JobStatus,
    /// Failure summary, if any.
    pub error_message: Option<String>,
    /// Repository the job ran against.
    pub repository_url: String,
    /// Pull request URL for pull request reviews.
    pub pr_url: Option<String>,
    /// When the notification was produced.
    pub at: DateTime<Utc>,
}

impl JobNotification {
    /// Builds a notification from a stored job.
    #[must_use]
    pub fn from_job(job: &Job, at: DateTime<Utc>) -> Self {
        Self {
            job_id: job.id(),
            kind: job.kind(),
            status: job.status(),
            error_message: job.error_message().map(ToOwned::to_owned),
            repository_url: job.repository().url().to_owned(),
            pr_url: job.pr_url().map(ToOwned::to_owned),
            at,
        }
    }

    /// Returns a one-line title such as `review completed`.
    #[must_use]
    pub fn title(&self) -> String {
        format!("{} {}", self.kind, self.status)
    }

    /// Returns a human-readable message body.
    #[must_use]
    pub fn message(&self) -> String {
        let target = self.pr_url.as_deref().unwrap_or(&self.repository_url);
        match &self.error_message {
            Some(error) => format!("job {} for {target}: {error}", self.job_id),
            None => format!("job {} for {target}", self.job_id),
        }
    }
}
