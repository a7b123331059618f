//! Diesel row models for job persistence.

use super::schema::{job_units, jobs, unit_attempts};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for job records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct JobRow {
    /// Job identifier.
    pub id: uuid::Uuid,
    /// Job kind.
    pub kind: String,
    /// Lifecycle status.
    pub status: String,
    /// Retry counter.
    pub retry_count: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Start of the current run.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure summary.
    pub error_message: Option<String>,
    /// Progress cursor.
    pub current_unit_index: i32,
    /// Unit total.
    pub total_units: i32,
    /// Provider name.
    pub provider: String,
    /// Repository URL.
    pub repository_url: String,
    /// Git reference.
    pub git_ref: String,
    /// Trigger source.
    pub source: String,
    /// Kind-specific payload.
    pub details: Value,
    /// Reviewed pull request URL.
    pub pr_url: Option<String>,
    /// Reviewed commit.
    pub commit_sha: Option<String>,
    /// Pull request revision counter.
    pub revision_count: i32,
    /// Merge or close time.
    pub merged_at: Option<DateTime<Utc>>,
}

/// Insert model for job records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJobRow {
    /// Job identifier.
    pub id: uuid::Uuid,
    /// Job kind.
    pub kind: String,
    /// Lifecycle status.
    pub status: String,
    /// Retry counter.
    pub retry_count: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Start of the current run.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure summary.
    pub error_message: Option<String>,
    /// Progress cursor.
    pub current_unit_index: i32,
    /// Unit total.
    pub total_units: i32,
    /// Provider name.
    pub provider: String,
    /// Repository URL.
    pub repository_url: String,
    /// Git reference.
    pub git_ref: String,
    /// Trigger source.
    pub source: String,
    /// Kind-specific payload.
    pub details: Value,
    /// Reviewed pull request URL.
    pub pr_url: Option<String>,
    /// Reviewed commit.
    pub commit_sha: Option<String>,
    /// Pull request revision counter.
    pub revision_count: i32,
    /// Merge or close time.
    pub merged_at: Option<DateTime<Utc>>,
}

/// Mutable lifecycle columns of a job.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = jobs)]
#[diesel(treat_none_as_null = true)]
pub struct JobStateChangeset {
    /// Lifecycle status.
    pub status: String,
    /// Retry counter.
    pub retry_count: i32,
    /// Start of the current run.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure summary.
    pub error_message: Option<String>,
    /// Progress cursor.
    pub current_unit_index: i32,
    /// Unit total.
    pub total_units: i32,
}

/// Query result and insert row for units.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = job_units)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UnitRow {
    /// Unit identifier.
    pub id: uuid::Uuid,
    /// Owning job.
    pub job_id: uuid::Uuid,
    /// Pipeline position.
    pub ordinal: i32,
    /// Unit name.
    pub name: String,
    /// Lifecycle status.
    pub status: String,
    /// Retry counter.
    pub retry_count: i32,
    /// Failure message.
    pub error_message: Option<String>,
    /// Result payload.
    pub result: Option<Value>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Mutable columns of a unit.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = job_units)]
#[diesel(treat_none_as_null = true)]
pub struct UnitStateChangeset {
    /// Lifecycle status.
    pub status: String,
    /// Retry counter.
    pub retry_count: i32,
    /// Failure message.
    pub error_message: Option<String>,
    /// Result payload.
    pub result: Option<Value>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result and insert row for attempts.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = unit_attempts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AttemptRow {
    /// Attempt identifier.
    pub id: uuid::Uuid,
    /// Executed unit.
    pub unit_id: uuid::Uuid,
    /// Attempt number.
    pub number: i32,
    /// Execution start.
    pub started_at: DateTime<Utc>,
    /// Execution end.
    pub finished_at: DateTime<Utc>,
    /// Outcome payload.
    pub outcome: Value,
    /// Output digest.
    pub output_digest: Option<String>,
}
