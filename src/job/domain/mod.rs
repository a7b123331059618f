//! Domain model for review and report jobs.
//!
//! A job is executed as an ordered list of units. Each unit execution is
//! recorded as an immutable attempt, and successful attempts yield a
//! structured result. Infrastructure concerns stay outside this module.

mod error;
mod finding;
mod ids;
mod job;
mod status;
mod unit;

pub use error::{
    JobDomainError, OutputParseError, ParseJobKindError, ParseJobStatusError, ParseUnitStatusError,
};
pub use finding::{Finding, Severity, UnitResult};
pub use ids::{AttemptId, JobId, UnitId};
pub use job::{
    DedupKey, Job, JobDetails, JobProgress, PersistedJobData, PullRequestInfo, ReportDetails,
    RepositoryTarget, ReviewDetails, TriggerSource,
};
pub use status::{JobKind, JobStatus, UnitStatus};
pub use unit::{
    Attempt, AttemptOutcome, PersistedAttemptData, PersistedUnitData, Unit, UnitDefinition,
    output_digest,
};
