//! Result of resolving one webhook event.

use crate::job::domain::{Job, JobId};

/// What the resolver did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A new `Pending` review was stored and should be submitted.
    Created(Job),
    /// A review for the same pull request URL and commit already exists.
    Existing(Job),
    /// The merge timestamp was set on earlier reviews of the pull request.
    MergedAtUpdated {
        /// Pull request URL.
        pr_url: String,
        /// Number of reviews updated.
        updated: u64,
    },
    /// The event does not lead to a review.
    Ignored {
        /// Why the event was ignored.
        reason: String,
    },
}

impl WebhookOutcome {
    /// Returns the identifier of the created or existing review.
    #[must_use]
    pub const fn job_id(&self) -> Option<JobId> {
        match self {
            Self::Created(job) | Self::Existing(job) => Some(job.id()),
            Self::MergedAtUpdated { .. } | Self::Ignored { .. } => None,
        }
    }

    /// Returns the job to submit, if this outcome created one.
    #[must_use]
    pub const fn created_job(&self) -> Option<&Job> {
        match self {
            Self::Created(job) => Some(job),
            Self::Existing(_) | Self::MergedAtUpdated { .. } | Self::Ignored { .. } => None,
        }
    }
}
