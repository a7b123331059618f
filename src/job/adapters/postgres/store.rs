//! `PostgreSQL` job store.

use super::{
    models::{AttemptRow, JobRow, JobStateChangeset, NewJobRow, UnitRow, UnitStateChangeset},
    schema::{job_units, jobs, unit_attempts},
};
use crate::job::{
    domain::{
        Attempt, AttemptId, DedupKey, Job, JobDetails, JobId, JobKind, JobStatus,
        PersistedAttemptData, PersistedJobData, PersistedUnitData, RepositoryTarget,
        TriggerSource, Unit, UnitId, UnitStatus,
    },
    ports::{JobStore, JobStoreError, JobStoreResult},
};
use crate::provider::domain::ProviderName;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use serde_json::Value;

/// `PostgreSQL` connection pool type used by the job store.
pub type JobPgPool = Pool<ConnectionManager<PgConnection>>;

const DEDUP_INDEX: &str = "idx_jobs_review_dedup_unique";

/// `PostgreSQL`-backed job store.
///
/// Conditional updates lock the row with `SELECT ... FOR UPDATE`, apply the
/// domain transition and write the lifecycle columns back in the same
/// transaction.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: JobPgPool,
}

impl PostgresJobStore {
    /// Creates a store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: JobPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> JobStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> JobStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(JobStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(JobStoreError::persistence)?
    }

    async fn in_transaction<F, T>(&self, f: F) -> JobStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, TxError> + Send + 'static,
        T: Send + 'static,
    {
        self.run_blocking(move |connection| {
            connection
                .transaction::<_, TxError, _>(f)
                .map_err(JobStoreError::from)
        })
        .await
    }
}

#[derive(Debug)]
enum TxError {
    Diesel(DieselError),
    Store(JobStoreError),
}

impl From<DieselError> for TxError {
    fn from(err: DieselError) -> Self {
        Self::Diesel(err)
    }
}

impl From<JobStoreError> for TxError {
    fn from(err: JobStoreError) -> Self {
        Self::Store(err)
    }
}

impl From<TxError> for JobStoreError {
    fn from(err: TxError) -> Self {
        match err {
            TxError::Diesel(inner) => Self::persistence(inner),
            TxError::Store(inner) => inner,
        }
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn create_job(&self, job: &Job) -> JobStoreResult<()> {
        let job_id = job.id();
        let dedup_key = job.dedup_key();
        let new_row = to_new_job_row(job)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(jobs::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match (err, dedup_key) {
                    (
                        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info),
                        Some(key),
                    ) if is_dedup_violation(info.as_ref()) => JobStoreError::DuplicateDedupKey(key),
                    (DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _), _) => {
                        JobStoreError::DuplicateJob(job_id)
                    }
                    (other, _) => JobStoreError::persistence(other),
                })?;
            Ok(())
        })
        .await
    }

    async fn find_job(&self, id: JobId) -> JobStoreResult<Option<Job>> {
        self.run_blocking(move |connection| {
            let row = jobs::table
                .find(id.into_inner())
                .select(JobRow::as_select())
                .first::<JobRow>(connection)
                .optional()
                .map_err(JobStoreError::persistence)?;
            row.map(row_to_job).transpose()
        })
        .await
    }

    async fn update_status_if_allowed(
        &self,
        id: JobId,
        target: JobStatus,
        allowed: &[JobStatus],
        at: DateTime<Utc>,
        error_message: Option<String>,
    ) -> JobStoreResult<u64> {
        let allowed_statuses = allowed.to_vec();
        self.in_transaction(move |tx| {
            let Some(mut job) = lock_job(tx, id)? else {
                return Ok(0);
            };
            if !allowed_statuses.contains(&job.status()) || !job.status().can_transition_to(target)
            {
                return Ok(0);
            }
            job.transition_to(target, at, error_message)
                .map_err(JobStoreError::from)?;
            save_job_state(tx, &job)?;
            Ok(1)
        })
        .await
    }

    async fn update_progress(&self, id: JobId, current_unit: u32) -> JobStoreResult<()> {
        self.in_transaction(move |tx| {
            let mut job = lock_job(tx, id)?.ok_or(JobStoreError::JobNotFound(id))?;
            job.record_progress(current_unit)
                .map_err(JobStoreError::from)?;
            save_job_state(tx, &job)
        })
        .await
    }

    async fn set_total_units(&self, id: JobId, total_units: u32) -> JobStoreResult<()> {
        let total = to_i32(total_units)?;
        self.run_blocking(move |connection| {
            let updated = diesel::update(jobs::table.find(id.into_inner()))
                .set(jobs::total_units.eq(total))
                .execute(connection)
                .map_err(JobStoreError::persistence)?;
            if updated == 0 {
                return Err(JobStoreError::JobNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_dedup_key(&self, key: &DedupKey) -> JobStoreResult<Option<Job>> {
        let pr_url = key.pr_url().to_owned();
        let commit_sha = key.commit_sha().to_owned();
        self.run_blocking(move |connection| {
            let row = jobs::table
                .filter(jobs::pr_url.eq(pr_url))
                .filter(jobs::commit_sha.eq(commit_sha))
                .select(JobRow::as_select())
                .first::<JobRow>(connection)
                .optional()
                .map_err(JobStoreError::persistence)?;
            row.map(row_to_job).transpose()
        })
        .await
    }

    async fn max_revision_by_pr_url(&self, pr_url: &str) -> JobStoreResult<Option<u32>> {
        let lookup = pr_url.to_owned();
        self.run_blocking(move |connection| {
            let max = jobs::table
                .filter(jobs::pr_url.eq(lookup))
                .filter(jobs::kind.eq(JobKind::Review.as_str()))
                .select(diesel::dsl::max(jobs::revision_count))
                .first::<Option<i32>>(connection)
                .map_err(JobStoreError::persistence)?;
            max.map(from_i32).transpose()
        })
        .await
    }

    async fn update_merged_at_by_pr_url(
        &self,
        pr_url: &str,
        merged_at: DateTime<Utc>,
    ) -> JobStoreResult<u64> {
        let lookup = pr_url.to_owned();
        self.run_blocking(move |connection| {
            let updated = diesel::update(jobs::table.filter(jobs::pr_url.eq(lookup)))
                .set(jobs::merged_at.eq(Some(merged_at)))
                .execute(connection)
                .map_err(JobStoreError::persistence)?;
            u64::try_from(updated).map_err(JobStoreError::persistence)
        })
        .await
    }

    async fn list_jobs_by_status(&self, status: JobStatus) -> JobStoreResult<Vec<Job>> {
        self.run_blocking(move |connection| {
            let rows = jobs::table
                .filter(jobs::status.eq(status.as_str()))
                .order((jobs::created_at.asc(), jobs::id.asc()))
                .select(JobRow::as_select())
                .load::<JobRow>(connection)
                .map_err(JobStoreError::persistence)?;
            rows.into_iter().map(row_to_job).collect()
        })
        .await
    }

    async fn create_units(&self, units: &[Unit]) -> JobStoreResult<()> {
        let Some(first) = units.first() else {
            return Ok(());
        };
        let job_id = first.job_id();
        let unit_id = first.id();
        let rows = units
            .iter()
            .map(to_unit_row)
            .collect::<JobStoreResult<Vec<_>>>()?;

        self.run_blocking(move |connection| {
            diesel::insert_into(job_units::table)
                .values(&rows)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                        JobStoreError::JobNotFound(job_id)
                    }
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        JobStoreError::DuplicateUnit(unit_id)
                    }
                    other => JobStoreError::persistence(other),
                })?;
            Ok(())
        })
        .await
    }

    async fn find_units(&self, job_id: JobId) -> JobStoreResult<Vec<Unit>> {
        self.run_blocking(move |connection| {
            let rows = job_units::table
                .filter(job_units::job_id.eq(job_id.into_inner()))
                .order(job_units::ordinal.asc())
                .select(UnitRow::as_select())
                .load::<UnitRow>(connection)
                .map_err(JobStoreError::persistence)?;
            rows.into_iter().map(row_to_unit).collect()
        })
        .await
    }

    async fn find_unit(&self, unit_id: UnitId) -> JobStoreResult<Option<Unit>> {
        self.run_blocking(move |connection| {
            let row = job_units::table
                .find(unit_id.into_inner())
                .select(UnitRow::as_select())
                .first::<UnitRow>(connection)
                .optional()
                .map_err(JobStoreError::persistence)?;
            row.map(row_to_unit).transpose()
        })
        .await
    }

    async fn update_unit(&self, unit: &Unit) -> JobStoreResult<()> {
        let unit_id = unit.id();
        let changes = to_unit_changeset(unit)?;
        self.run_blocking(move |connection| {
            let updated = diesel::update(job_units::table.find(unit_id.into_inner()))
                .set(&changes)
                .execute(connection)
                .map_err(JobStoreError::persistence)?;
            if updated == 0 {
                return Err(JobStoreError::UnitNotFound(unit_id));
            }
            Ok(())
        })
        .await
    }

    async fn update_unit_status_if_allowed(
        &self,
        unit_id: UnitId,
        target: UnitStatus,
        allowed: &[UnitStatus],
        at: DateTime<Utc>,
    ) -> JobStoreResult<u64> {
        let allowed_statuses = allowed.to_vec();
        self.in_transaction(move |tx| {
            let row = job_units::table
                .find(unit_id.into_inner())
                .for_update()
                .select(UnitRow::as_select())
                .first::<UnitRow>(tx)
                .optional()?;
            let Some(mut unit) = row.map(row_to_unit).transpose()? else {
                return Ok(0);
            };
            if !allowed_statuses.contains(&unit.status())
                || !unit.status().can_transition_to(target)
            {
                return Ok(0);
            }
            unit.transition_to(target, at).map_err(JobStoreError::from)?;
            diesel::update(job_units::table.find(unit_id.into_inner()))
                .set(&to_unit_changeset(&unit)?)
                .execute(tx)?;
            Ok(1)
        })
        .await
    }

    async fn append_attempt(&self, attempt: &Attempt) -> JobStoreResult<()> {
        let unit_id = attempt.unit_id();
        let number = attempt.number();
        let row = to_attempt_row(attempt)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(unit_attempts::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                        JobStoreError::UnitNotFound(unit_id)
                    }
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        JobStoreError::DuplicateAttempt { unit_id, number }
                    }
                    other => JobStoreError::persistence(other),
                })?;
            Ok(())
        })
        .await
    }

    async fn find_attempts(&self, unit_id: UnitId) -> JobStoreResult<Vec<Attempt>> {
        self.run_blocking(move |connection| {
            let rows = unit_attempts::table
                .filter(unit_attempts::unit_id.eq(unit_id.into_inner()))
                .order(unit_attempts::number.asc())
                .select(AttemptRow::as_select())
                .load::<AttemptRow>(connection)
                .map_err(JobStoreError::persistence)?;
            rows.into_iter().map(row_to_attempt).collect()
        })
        .await
    }
}

fn lock_job(tx: &mut PgConnection, id: JobId) -> Result<Option<Job>, TxError> {
    let row = jobs::table
        .find(id.into_inner())
        .for_update()
        .select(JobRow::as_select())
        .first::<JobRow>(tx)
        .optional()?;
    Ok(row.map(row_to_job).transpose()?)
}

fn save_job_state(tx: &mut PgConnection, job: &Job) -> Result<(), TxError> {
    let changes = JobStateChangeset {
        status: job.status().as_str().to_owned(),
        retry_count: to_i32(job.retry_count())?,
        started_at: job.started_at(),
        completed_at: job.completed_at(),
        error_message: job.error_message().map(str::to_owned),
        current_unit_index: to_i32(job.current_unit_index())?,
        total_units: to_i32(job.total_units())?,
    };
    diesel::update(jobs::table.find(job.id().into_inner()))
        .set(&changes)
        .execute(tx)?;
    Ok(())
}

fn to_new_job_row(job: &Job) -> JobStoreResult<NewJobRow> {
    let details = serde_json::to_value(job.details()).map_err(JobStoreError::persistence)?;
    let review = job.review();
    Ok(NewJobRow {
        id: job.id().into_inner(),
        kind: job.kind().as_str().to_owned(),
        status: job.status().as_str().to_owned(),
        retry_count: to_i32(job.retry_count())?,
        created_at: job.created_at(),
        started_at: job.started_at(),
        completed_at: job.completed_at(),
        error_message: job.error_message().map(str::to_owned),
        current_unit_index: to_i32(job.current_unit_index())?,
        total_units: to_i32(job.total_units())?,
        provider: job.repository().provider().as_str().to_owned(),
        repository_url: job.repository().url().to_owned(),
        git_ref: job.repository().git_ref().to_owned(),
        source: job.source().as_str().to_owned(),
        details,
        pr_url: job.pr_url().map(str::to_owned),
        commit_sha: review
            .and_then(|details| details.commit_sha())
            .map(str::to_owned),
        revision_count: to_i32(review.map_or(0, |details| details.revision_count()))?,
        merged_at: job.merged_at(),
    })
}

fn row_to_job(row: JobRow) -> JobStoreResult<Job> {
    let provider = ProviderName::new(row.provider).map_err(JobStoreError::persistence)?;
    let repository = RepositoryTarget::new(provider, row.repository_url, row.git_ref)
        .map_err(JobStoreError::persistence)?;
    let source = serde_json::from_value::<TriggerSource>(Value::String(row.source))
        .map_err(JobStoreError::persistence)?;
    let details =
        serde_json::from_value::<JobDetails>(row.details).map_err(JobStoreError::persistence)?;
    let status = JobStatus::try_from(row.status.as_str()).map_err(JobStoreError::persistence)?;

    Ok(Job::from_persisted(PersistedJobData {
        id: JobId::from_uuid(row.id),
        status,
        retry_count: from_i32(row.retry_count)?,
        created_at: row.created_at,
        started_at: row.started_at,
        completed_at: row.completed_at,
        error_message: row.error_message,
        current_unit_index: from_i32(row.current_unit_index)?,
        total_units: from_i32(row.total_units)?,
        repository,
        source,
        details,
        merged_at: row.merged_at,
    }))
}

fn to_unit_row(unit: &Unit) -> JobStoreResult<UnitRow> {
    let changes = to_unit_changeset(unit)?;
    Ok(UnitRow {
        id: unit.id().into_inner(),
        job_id: unit.job_id().into_inner(),
        ordinal: to_i32(unit.ordinal())?,
        name: unit.name().to_owned(),
        status: changes.status,
        retry_count: changes.retry_count,
        error_message: changes.error_message,
        result: changes.result,
        updated_at: changes.updated_at,
    })
}

fn to_unit_changeset(unit: &Unit) -> JobStoreResult<UnitStateChangeset> {
    let result = unit
        .result()
        .map(serde_json::to_value)
        .transpose()
        .map_err(JobStoreError::persistence)?;
    Ok(UnitStateChangeset {
        status: unit.status().as_str().to_owned(),
        retry_count: to_i32(unit.retry_count())?,
        error_message: unit.error_message().map(str::to_owned),
        result,
        updated_at: unit.updated_at(),
    })
}

fn row_to_unit(row: UnitRow) -> JobStoreResult<Unit> {
    let status = UnitStatus::try_from(row.status.as_str()).map_err(JobStoreError::persistence)?;
    let result = row
        .result
        .map(serde_json::from_value)
        .transpose()
        .map_err(JobStoreError::persistence)?;
    Ok(Unit::from_persisted(PersistedUnitData {
        id: UnitId::from_uuid(row.id),
        job_id: JobId::from_uuid(row.job_id),
        ordinal: from_i32(row.ordinal)?,
        name: row.name,
        status,
        retry_count: from_i32(row.retry_count)?,
        error_message: row.error_message,
        result,
        updated_at: row.updated_at,
    }))
}

fn to_attempt_row(attempt: &Attempt) -> JobStoreResult<AttemptRow> {
    Ok(AttemptRow {
        id: attempt.id().into_inner(),
        unit_id: attempt.unit_id().into_inner(),
        number: to_i32(attempt.number())?,
        started_at: attempt.started_at(),
        finished_at: attempt.finished_at(),
        outcome: serde_json::to_value(attempt.outcome()).map_err(JobStoreError::persistence)?,
        output_digest: attempt.output_digest().map(str::to_owned),
    })
}

fn row_to_attempt(row: AttemptRow) -> JobStoreResult<Attempt> {
    Ok(Attempt::from_persisted(PersistedAttemptData {
        id: AttemptId::from_uuid(row.id),
        unit_id: UnitId::from_uuid(row.unit_id),
        number: from_i32(row.number)?,
        started_at: row.started_at,
        finished_at: row.finished_at,
        outcome: serde_json::from_value(row.outcome).map_err(JobStoreError::persistence)?,
        output_digest: row.output_digest,
    }))
}

fn is_dedup_violation(info: &dyn DatabaseErrorInformation) -> bool {
    info.constraint_name()
        .is_some_and(|name| name == DEDUP_INDEX)
}

fn to_i32(value: u32) -> JobStoreResult<i32> {
    i32::try_from(value).map_err(JobStoreError::persistence)
}

fn from_i32(value: i32) -> JobStoreResult<u32> {
    u32::try_from(value).map_err(JobStoreError::persistence)
}
