//! Error types for job domain validation and parsing.

use super::{JobId, JobStatus, UnitId, UnitStatus};
use thiserror::Error;

/// Errors returned while constructing or mutating job domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobDomainError {
    /// The repository URL is empty after trimming.
    #[error("repository URL must not be empty")]
    EmptyRepositoryUrl,

    /// The git ref is empty after trimming.
    #[error("git ref must not be empty")]
    EmptyGitRef,

    /// The commit SHA is empty after trimming.
    #[error("commit SHA must not be empty")]
    EmptyCommitSha,

    /// The pull request URL is empty after trimming.
    #[error("pull request URL must not be empty")]
    EmptyPullRequestUrl,

    /// The pull request number is zero.
    #[error("invalid pull request number {0}, expected a positive integer")]
    InvalidPullRequestNumber(u64),

    /// The report title is empty after trimming.
    #[error("report title must not be empty")]
    EmptyReportTitle,

    /// The unit name is empty after trimming.
    #[error("unit name must not be empty")]
    EmptyUnitName,

    /// The job status transition is not permitted by the state machine.
    #[error("job {job_id} cannot transition from {from} to {to}")]
    InvalidStatusTransition {
        /// Job identifier.
        job_id: JobId,
        /// Current status.
        from: JobStatus,
        /// Requested status.
        to: JobStatus,
    },

    /// The unit status transition is not permitted by the state machine.
    #[error("unit {unit_id} cannot transition from {from} to {to}")]
    InvalidUnitTransition {
        /// Unit identifier.
        unit_id: UnitId,
        /// Current status.
        from: UnitStatus,
        /// Requested status.
        to: UnitStatus,
    },

    /// The progress cursor would move backwards or past the unit total.
    #[error("job {job_id} progress {requested} is invalid (current {current}, total {total})")]
    InvalidProgress {
        /// Job identifier.
        job_id: JobId,
        /// Current cursor.
        current: u32,
        /// Requested cursor.
        requested: u32,
        /// Total unit count.
        total: u32,
    },
}

/// Error returned while parsing job statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown job status: {0}")]
pub struct ParseJobStatusError(pub String);

/// Error returned while parsing unit statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown unit status: {0}")]
pub struct ParseUnitStatusError(pub String);

/// Error returned while parsing job kinds from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown job kind: {0}")]
pub struct ParseJobKindError(pub String);

/// Errors raised while interpreting raw agent output as a unit result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OutputParseError {
    /// The agent returned no usable content.
    #[error("agent output is empty")]
    EmptyOutput,

    /// The agent output is not valid JSON of the expected shape.
    #[error("agent output is not valid findings JSON: {0}")]
    MalformedFindings(String),
}
