//! Job aggregate root and the kind-specific data it carries.

use super::{JobDomainError, JobId, JobKind, JobStatus};
use crate::provider::domain::ProviderName;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Repository a job operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryTarget {
    provider: ProviderName,
    url: String,
    git_ref: String,
}

impl RepositoryTarget {
    /// Creates a validated repository target.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::EmptyRepositoryUrl`] or
    /// [`JobDomainError::EmptyGitRef`] when either value is blank.
    pub fn new(
        provider: ProviderName,
        url: impl Into<String>,
        git_ref: impl Into<String>,
    ) -> Result<Self, JobDomainError> {
        Ok(Self {
            provider,
            url: non_empty(url.into(), JobDomainError::EmptyRepositoryUrl)?,
            git_ref: non_empty(git_ref.into(), JobDomainError::EmptyGitRef)?,
        })
    }

    /// Returns the git hosting provider name.
    #[must_use]
    pub const fn provider(&self) -> &ProviderName {
        &self.provider
    }

    /// Returns the repository URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the branch, tag, or commit the job targets.
    #[must_use]
    pub fn git_ref(&self) -> &str {
        &self.git_ref
    }
}

/// Who or what requested the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// Direct API request.
    Api,
    /// Inbound push event.
    Push,
    /// Inbound pull/merge request event.
    PullRequest,
}

impl TriggerSource {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Push => "push",
            Self::PullRequest => "pull_request",
        }
    }
}

/// Pull or merge request a review was created for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullRequestInfo {
    url: String,
    number: u64,
}

impl PullRequestInfo {
    /// Creates validated pull request information.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::EmptyPullRequestUrl`] for a blank URL and
    /// [`JobDomainError::InvalidPullRequestNumber`] for number zero.
    pub fn new(url: impl Into<String>, number: u64) -> Result<Self, JobDomainError> {
        if number == 0 {
            return Err(JobDomainError::InvalidPullRequestNumber(number));
        }
        Ok(Self {
            url: non_empty(url.into(), JobDomainError::EmptyPullRequestUrl)?,
            number,
        })
    }

    /// Returns the pull request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the provider-assigned pull request number.
    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }
}

/// Webhook idempotency key: one review per pull request URL and commit.
///
/// # Examples
///
///     use revue::job::domain::DedupKey;
///
///     let key = DedupKey::new("https://github.com/acme/api/pull/7", "abc123")
///         .expect("valid dedup key");
///     assert_eq!(key.commit_sha(), "abc123");
///     assert!(DedupKey::new("https://github.com/acme/api/pull/7", " ").is_err());
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pr_url: String,
    commit_sha: String,
}

impl DedupKey {
    /// Creates a validated dedup key.
    ///
    /// # Errors
    ///
    /// Returns a domain error when either component is blank.
    pub fn new(
        pr_url: impl Into<String>,
        commit_sha: impl Into<String>,
    ) -> Result<Self, JobDomainError> {
        Ok(Self {
            pr_url: non_empty(pr_url.into(), JobDomainError::EmptyPullRequestUrl)?,
            commit_sha: non_empty(commit_sha.into(), JobDomainError::EmptyCommitSha)?,
        })
    }

    /// Returns the pull request URL component.
    #[must_use]
    pub fn pr_url(&self) -> &str {
        &self.pr_url
    }

    /// Returns the commit SHA component.
    #[must_use]
    pub fn commit_sha(&self) -> &str {
        &self.commit_sha
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pr_url, self.commit_sha)
    }
}

/// Review-specific job data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDetails {
    commit_sha: Option<String>,
    pull_request: Option<PullRequestInfo>,
    revision_count: u32,
}

impl ReviewDetails {
    /// Review of a plain ref, optionally pinned to a commit.
    #[must_use]
    pub fn for_ref(commit_sha: Option<String>) -> Self {
        Self {
            commit_sha: commit_sha.filter(|sha| !sha.trim().is_empty()),
            pull_request: None,
            revision_count: 0,
        }
    }

    /// Review of a pull request at a specific commit and revision.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::EmptyCommitSha`] for a blank commit.
    pub fn for_pull_request(
        pull_request: PullRequestInfo,
        commit_sha: impl Into<String>,
        revision_count: u32,
    ) -> Result<Self, JobDomainError> {
        let sha = non_empty(commit_sha.into(), JobDomainError::EmptyCommitSha)?;
        Ok(Self {
            commit_sha: Some(sha),
            pull_request: Some(pull_request),
            revision_count,
        })
    }

    /// Returns the reviewed commit, if pinned.
    #[must_use]
    pub fn commit_sha(&self) -> Option<&str> {
        self.commit_sha.as_deref()
    }

    /// Returns the pull request, if the review targets one.
    #[must_use]
    pub const fn pull_request(&self) -> Option<&PullRequestInfo> {
        self.pull_request.as_ref()
    }

    /// Returns how many times the pull request has been revised.
    #[must_use]
    pub const fn revision_count(&self) -> u32 {
        self.revision_count
    }
}

/// Report-specific job data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDetails {
    title: String,
}

impl ReportDetails {
    /// Creates report details.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::EmptyReportTitle`] for a blank title.
    pub fn new(title: impl Into<String>) -> Result<Self, JobDomainError> {
        Ok(Self {
            title: non_empty(title.into(), JobDomainError::EmptyReportTitle)?,
        })
    }

    /// Returns the report title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }
}

/// Kind-specific job payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobDetails {
    /// Code review payload.
    Review(ReviewDetails),
    /// Documentation report payload.
    Report(ReportDetails),
}

impl JobDetails {
    /// Returns the job kind for this payload.
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        match self {
            Self::Review(_) => JobKind::Review,
            Self::Report(_) => JobKind::Report,
        }
    }
}

/// Snapshot of a job's progress, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    /// Number of units the pipeline has moved past.
    pub current_unit: u32,
    /// Number of units in the pipeline.
    pub total_units: u32,
    /// Current job status.
    pub status: JobStatus,
    /// Failure summary, if any.
    pub error_message: Option<String>,
}

/// Job aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    status: JobStatus,
    retry_count: u32,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    current_unit_index: u32,
    total_units: u32,
    repository: RepositoryTarget,
    source: TriggerSource,
    details: JobDetails,
    merged_at: Option<DateTime<Utc>>,
}

/// Parameter object for reconstructing a persisted job aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedJobData {
    /// Persisted job identifier.
    pub id: JobId,
    /// Persisted lifecycle status.
    pub status: JobStatus,
    /// Persisted retry counter.
    pub retry_count: u32,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted start timestamp.
    pub started_at: Option<DateTime<Utc>>,
    /// Persisted completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Persisted failure summary.
    pub error_message: Option<String>,
    /// Persisted progress cursor.
    pub current_unit_index: u32,
    /// Persisted unit total.
    pub total_units: u32,
    /// Persisted repository target.
    pub repository: RepositoryTarget,
    /// Persisted trigger source.
    pub source: TriggerSource,
    /// Persisted kind-specific payload.
    pub details: JobDetails,
    /// Persisted merge timestamp of the reviewed pull request.
    pub merged_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Creates a new `Pending` job.
    #[must_use]
    pub fn new(
        repository: RepositoryTarget,
        source: TriggerSource,
        details: JobDetails,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            retry_count: 0,
            created_at: clock.utc(),
            started_at: None,
            completed_at: None,
            error_message: None,
            current_unit_index: 0,
            total_units: 0,
            repository,
            source,
            details,
            merged_at: None,
        }
    }

    /// Reconstructs a job from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedJobData) -> Self {
        Self {
            id: data.id,
            status: data.status,
            retry_count: data.retry_count,
            created_at: data.created_at,
            started_at: data.started_at,
            completed_at: data.completed_at,
            error_message: data.error_message,
            current_unit_index: data.current_unit_index,
            total_units: data.total_units,
            repository: data.repository,
            source: data.source,
            details: data.details,
            merged_at: data.merged_at,
        }
    }

    /// Returns the job identifier.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Returns the job kind.
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        self.details.kind()
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> JobStatus {
        self.status
    }

    /// Returns how many explicit retries have been requested.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the current run was claimed by a worker.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Returns when the job completed or failed.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the failure summary, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the progress cursor.
    #[must_use]
    pub const fn current_unit_index(&self) -> u32 {
        self.current_unit_index
    }

    /// Returns the number of units in the pipeline.
    #[must_use]
    pub const fn total_units(&self) -> u32 {
        self.total_units
    }

    /// Returns the repository target.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryTarget {
        &self.repository
    }

    /// Returns the trigger source.
    #[must_use]
    pub const fn source(&self) -> TriggerSource {
        self.source
    }

    /// Returns the kind-specific payload.
    #[must_use]
    pub const fn details(&self) -> &JobDetails {
        &self.details
    }

    /// Returns when the reviewed pull request was merged or closed.
    #[must_use]
    pub const fn merged_at(&self) -> Option<DateTime<Utc>> {
        self.merged_at
    }

    /// Returns the review payload when this job is a review.
    #[must_use]
    pub const fn review(&self) -> Option<&ReviewDetails> {
        match &self.details {
            JobDetails::Review(review) => Some(review),
            JobDetails::Report(_) => None,
        }
    }

    /// Returns the pull request URL for pull request reviews.
    #[must_use]
    pub fn pr_url(&self) -> Option<&str> {
        self.review()
            .and_then(ReviewDetails::pull_request)
            .map(PullRequestInfo::url)
    }

    /// Returns the webhook dedup key for pull request reviews.
    #[must_use]
    pub fn dedup_key(&self) -> Option<DedupKey> {
        let review = self.review()?;
        let pr_url = review.pull_request()?.url();
        let commit_sha = review.commit_sha()?;
        DedupKey::new(pr_url, commit_sha).ok()
    }

    /// Returns the caller-facing progress snapshot.
    #[must_use]
    pub fn progress(&self) -> JobProgress {
        JobProgress {
            current_unit: self.current_unit_index,
            total_units: self.total_units,
            status: self.status,
            error_message: self.error_message.clone(),
        }
    }

    /// Applies a state-machine transition and the timestamps it implies.
    ///
    /// `completed_at` is set only for `Completed` and `Failed`. Moving back
    /// to `Pending` clears the failure summary and rewinds the progress
    /// cursor.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidStatusTransition`] when the state
    /// machine does not permit the move.
    pub fn transition_to(
        &mut self,
        target: JobStatus,
        at: DateTime<Utc>,
        error_message: Option<String>,
    ) -> Result<(), JobDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(JobDomainError::InvalidStatusTransition {
                job_id: self.id,
                from: self.status,
                to: target,
            });
        }

        match target {
            JobStatus::Pending => {
                self.retry_count = self.retry_count.saturating_add(1);
                self.started_at = None;
                self.completed_at = None;
                self.error_message = None;
                self.current_unit_index = 0;
            }
            JobStatus::Running => {
                self.started_at = Some(at);
                self.completed_at = None;
            }
            JobStatus::Completed => {
                self.completed_at = Some(at);
                self.error_message = None;
            }
            JobStatus::Failed => {
                self.completed_at = Some(at);
                self.error_message = Some(error_message.unwrap_or_else(|| "job failed".to_owned()));
            }
            JobStatus::Cancelled => {
                self.completed_at = None;
                self.error_message = error_message;
            }
        }
        self.status = target;
        Ok(())
    }

    /// Moves the progress cursor forward.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidProgress`] when the cursor would move
    /// backwards or beyond the unit total.
    pub const fn record_progress(&mut self, current_unit: u32) -> Result<(), JobDomainError> {
        if current_unit < self.current_unit_index || current_unit > self.total_units {
            return Err(JobDomainError::InvalidProgress {
                job_id: self.id,
                current: self.current_unit_index,
                requested: current_unit,
                total: self.total_units,
            });
        }
        self.current_unit_index = current_unit;
        Ok(())
    }

    /// Records how many units the pipeline contains.
    pub const fn set_total_units(&mut self, total_units: u32) {
        self.total_units = total_units;
    }

    /// Records the merge or close time of the reviewed pull request.
    pub const fn mark_merged(&mut self, at: DateTime<Utc>) {
        self.merged_at = Some(at);
    }
}

fn non_empty(value: String, error: JobDomainError) -> Result<String, JobDomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(error);
    }
    Ok(trimmed.to_owned())
}
