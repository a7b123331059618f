//! Store port for jobs, units and attempts.
//!
//! Every transition that matters for correctness goes through a conditional
//! update ("set to X only if the current status is one of ..."). A return
//! value of zero affected rows means the precondition was not met and is
//! not an error.

use crate::job::domain::{
    Attempt, DedupKey, Job, JobDomainError, JobId, JobStatus, Unit, UnitId, UnitStatus,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for job store operations.
pub type JobStoreResult<T> = Result<T, JobStoreError>;

/// Job persistence contract.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Stores a new job.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::DuplicateJob`] when the identifier exists or
    /// [`JobStoreError::DuplicateDedupKey`] when a review for the same pull
    /// request URL and commit already exists.
    async fn create_job(&self, job: &Job) -> JobStoreResult<()>;

    /// Finds a job by identifier.
    async fn find_job(&self, id: JobId) -> JobStoreResult<Option<Job>>;

    /// Moves a job to `target` only if its current status is in `allowed`.
    ///
    /// Returning a job to `Pending` counts a retry in the same update.
    ///
    /// Returns the number of affected rows: `1` on success, `0` when the job
    /// is absent or its status is not in `allowed`.
    async fn update_status_if_allowed(
        &self,
        id: JobId,
        target: JobStatus,
        allowed: &[JobStatus],
        at: DateTime<Utc>,
        error_message: Option<String>,
    ) -> JobStoreResult<u64>;

    /// Advances the progress cursor.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::JobNotFound`] for unknown jobs and
    /// [`JobStoreError::Rejected`] when the cursor would move backwards.
    async fn update_progress(&self, id: JobId, current_unit: u32) -> JobStoreResult<()>;

    /// Records the number of units in the job's pipeline.
    async fn set_total_units(&self, id: JobId, total_units: u32) -> JobStoreResult<()>;

    /// Finds the review created for a pull request URL and commit.
    async fn find_by_dedup_key(&self, key: &DedupKey) -> JobStoreResult<Option<Job>>;

    /// Returns the highest revision count among reviews of a pull request.
    async fn max_revision_by_pr_url(&self, pr_url: &str) -> JobStoreResult<Option<u32>>;

    /// Sets the merge timestamp on every review of a pull request.
    ///
    /// Returns the number of affected rows.
    async fn update_merged_at_by_pr_url(
        &self,
        pr_url: &str,
        merged_at: DateTime<Utc>,
    ) -> JobStoreResult<u64>;

    /// Returns all jobs with the given status, oldest first.
    async fn list_jobs_by_status(&self, status: JobStatus) -> JobStoreResult<Vec<Job>>;

    /// Stores the units of a job's pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::JobNotFound`] when the owning job is absent
    /// or [`JobStoreError::DuplicateUnit`] when a unit already exists.
    async fn create_units(&self, units: &[Unit]) -> JobStoreResult<()>;

    /// Returns a job's units in ordinal order.
    async fn find_units(&self, job_id: JobId) -> JobStoreResult<Vec<Unit>>;

    /// Finds a unit by identifier.
    async fn find_unit(&self, unit_id: UnitId) -> JobStoreResult<Option<Unit>>;

    /// Persists changes to an existing unit.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::UnitNotFound`] when the unit does not exist.
    async fn update_unit(&self, unit: &Unit) -> JobStoreResult<()>;

    /// Moves a unit to `target` only if its current status is in `allowed`.
    ///
    /// Returns the number of affected rows.
    async fn update_unit_status_if_allowed(
        &self,
        unit_id: UnitId,
        target: UnitStatus,
        allowed: &[UnitStatus],
        at: DateTime<Utc>,
    ) -> JobStoreResult<u64>;

    /// Appends an immutable attempt record.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::UnitNotFound`] when the unit is absent or
    /// [`JobStoreError::DuplicateAttempt`] when the attempt already exists.
    async fn append_attempt(&self, attempt: &Attempt) -> JobStoreResult<()>;

    /// Returns a unit's attempts ordered by attempt number.
    async fn find_attempts(&self, unit_id: UnitId) -> JobStoreResult<Vec<Attempt>>;
}

/// Errors returned by job store implementations.
#[derive(Debug, Clone, Error)]
pub enum JobStoreError {
    /// A job with the same identifier already exists.
    #[error("duplicate job identifier: {0}")]
    DuplicateJob(JobId),

    /// A review for the same pull request URL and commit already exists.
    #[error("duplicate review for {0}")]
    DuplicateDedupKey(DedupKey),

    /// A unit with the same identifier already exists.
    #[error("duplicate unit identifier: {0}")]
    DuplicateUnit(UnitId),

    /// Attempt records are append-only.
    #[error("attempt {number} of unit {unit_id} already recorded")]
    DuplicateAttempt {
        /// Unit the attempt belongs to.
        unit_id: UnitId,
        /// Attempt number.
        number: u32,
    },

    /// The job was not found.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// The unit was not found.
    #[error("unit not found: {0}")]
    UnitNotFound(UnitId),

    /// The domain model rejected the change.
    #[error(transparent)]
    Rejected(#[from] JobDomainError),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl JobStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
