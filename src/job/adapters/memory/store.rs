//! In-memory job store for tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::job::{
    domain::{Attempt, DedupKey, Job, JobId, JobStatus, Unit, UnitId, UnitStatus},
    ports::{JobStore, JobStoreError, JobStoreResult},
};

/// Thread-safe in-memory job store.
///
/// Each operation holds the state lock for its whole duration, which makes
/// the conditional updates atomic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobStore {
    state: Arc<RwLock<InMemoryJobState>>,
}

#[derive(Debug, Default)]
struct InMemoryJobState {
    jobs: HashMap<JobId, Job>,
    dedup_index: HashMap<DedupKey, JobId>,
    units: HashMap<UnitId, Unit>,
    job_units: HashMap<JobId, Vec<UnitId>>,
    attempts: HashMap<UnitId, Vec<Attempt>>,
}

impl InMemoryJobStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> JobStoreResult<RwLockReadGuard<'_, InMemoryJobState>> {
        self.state
            .read()
            .map_err(|err| JobStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> JobStoreResult<RwLockWriteGuard<'_, InMemoryJobState>> {
        self.state
            .write()
            .map_err(|err| JobStoreError::persistence(std::io::Error::other(err.to_string())))
    }
}

impl InMemoryJobState {
    fn job_mut(&mut self, id: JobId) -> JobStoreResult<&mut Job> {
        self.jobs.get_mut(&id).ok_or(JobStoreError::JobNotFound(id))
    }

    fn reviews_for_pr_url<'a>(&'a self, pr_url: &'a str) -> impl Iterator<Item = &'a Job> + 'a {
        self.jobs
            .values()
            .filter(move |job| job.pr_url() == Some(pr_url))
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, job: &Job) -> JobStoreResult<()> {
        let mut state = self.write()?;
        if state.jobs.contains_key(&job.id()) {
            return Err(JobStoreError::DuplicateJob(job.id()));
        }
        if let Some(key) = job.dedup_key() {
            if state.dedup_index.contains_key(&key) {
                return Err(JobStoreError::DuplicateDedupKey(key));
            }
            state.dedup_index.insert(key, job.id());
        }
        state.jobs.insert(job.id(), job.clone());
        Ok(())
    }

    async fn find_job(&self, id: JobId) -> JobStoreResult<Option<Job>> {
        Ok(self.read()?.jobs.get(&id).cloned())
    }

    async fn update_status_if_allowed(
        &self,
        id: JobId,
        target: JobStatus,
        allowed: &[JobStatus],
        at: DateTime<Utc>,
        error_message: Option<String>,
    ) -> JobStoreResult<u64> {
        let mut state = self.write()?;
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(0);
        };
        if !allowed.contains(&job.status()) || !job.status().can_transition_to(target) {
            return Ok(0);
        }
        job.transition_to(target, at, error_message)?;
        Ok(1)
    }

    async fn update_progress(&self, id: JobId, current_unit: u32) -> JobStoreResult<()> {
        let mut state = self.write()?;
        state.job_mut(id)?.record_progress(current_unit)?;
        Ok(())
    }

    async fn set_total_units(&self, id: JobId, total_units: u32) -> JobStoreResult<()> {
        let mut state = self.write()?;
        state.job_mut(id)?.set_total_units(total_units);
        Ok(())
    }

    async fn find_by_dedup_key(&self, key: &DedupKey) -> JobStoreResult<Option<Job>> {
        let state = self.read()?;
        Ok(state
            .dedup_index
            .get(key)
            .and_then(|id| state.jobs.get(id))
            .cloned())
    }

    async fn max_revision_by_pr_url(&self, pr_url: &str) -> JobStoreResult<Option<u32>> {
        let state = self.read()?;
        Ok(state
            .reviews_for_pr_url(pr_url)
            .filter_map(Job::review)
            .map(|review| review.revision_count())
            .max())
    }

    async fn update_merged_at_by_pr_url(
        &self,
        pr_url: &str,
        merged_at: DateTime<Utc>,
    ) -> JobStoreResult<u64> {
        let mut state = self.write()?;
        let mut affected = 0_u64;
        for job in state.jobs.values_mut() {
            if job.pr_url() == Some(pr_url) {
                job.mark_merged(merged_at);
                affected = affected.saturating_add(1);
            }
        }
        Ok(affected)
    }

    async fn list_jobs_by_status(&self, status: JobStatus) -> JobStoreResult<Vec<Job>> {
        let state = self.read()?;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|job| job.status() == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| (job.created_at(), job.id()));
        Ok(jobs)
    }

    async fn create_units(&self, units: &[Unit]) -> JobStoreResult<()> {
        let mut state = self.write()?;
        for unit in units {
            if !state.jobs.contains_key(&unit.job_id()) {
                return Err(JobStoreError::JobNotFound(unit.job_id()));
            }
            if state.units.contains_key(&unit.id()) {
                return Err(JobStoreError::DuplicateUnit(unit.id()));
            }
        }
        for unit in units {
            state
                .job_units
                .entry(unit.job_id())
                .or_default()
                .push(unit.id());
            state.units.insert(unit.id(), unit.clone());
        }
        Ok(())
    }

    async fn find_units(&self, job_id: JobId) -> JobStoreResult<Vec<Unit>> {
        let state = self.read()?;
        let mut units: Vec<Unit> = state
            .job_units
            .get(&job_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.units.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        units.sort_by_key(Unit::ordinal);
        Ok(units)
    }

    async fn find_unit(&self, unit_id: UnitId) -> JobStoreResult<Option<Unit>> {
        Ok(self.read()?.units.get(&unit_id).cloned())
    }

    async fn update_unit(&self, unit: &Unit) -> JobStoreResult<()> {
        let mut state = self.write()?;
        let stored = state
            .units
            .get_mut(&unit.id())
            .ok_or(JobStoreError::UnitNotFound(unit.id()))?;
        *stored = unit.clone();
        Ok(())
    }

    async fn update_unit_status_if_allowed(
        &self,
        unit_id: UnitId,
        target: UnitStatus,
        allowed: &[UnitStatus],
        at: DateTime<Utc>,
    ) -> JobStoreResult<u64> {
        let mut state = self.write()?;
        let Some(unit) = state.units.get_mut(&unit_id) else {
            return Ok(0);
        };
        if !allowed.contains(&unit.status()) || !unit.status().can_transition_to(target) {
            return Ok(0);
        }
        unit.transition_to(target, at)?;
        Ok(1)
    }

    async fn append_attempt(&self, attempt: &Attempt) -> JobStoreResult<()> {
        let mut state = self.write()?;
        if !state.units.contains_key(&attempt.unit_id()) {
            return Err(JobStoreError::UnitNotFound(attempt.unit_id()));
        }
        let attempts = state.attempts.entry(attempt.unit_id()).or_default();
        if attempts
            .iter()
            .any(|existing| existing.id() == attempt.id() || existing.number() == attempt.number())
        {
            return Err(JobStoreError::DuplicateAttempt {
                unit_id: attempt.unit_id(),
                number: attempt.number(),
            });
        }
        attempts.push(attempt.clone());
        Ok(())
    }

    async fn find_attempts(&self, unit_id: UnitId) -> JobStoreResult<Vec<Attempt>> {
        let state = self.read()?;
        let mut attempts = state.attempts.get(&unit_id).cloned().unwrap_or_default();
        attempts.sort_by_key(Attempt::number);
        Ok(attempts)
    }
}
