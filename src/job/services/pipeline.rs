//! Ordered unit pipeline for review rules and report sections.
//!
//! Units run strictly in ordinal order. Before each unit the executor
//! re-reads the job and stops if it is no longer `Running`, which is how
//! cancellation and the timeout reaper are observed. A unit is never
//! interrupted once started.

use super::config::{CompletionPolicy, PipelinePolicy, UnitFailurePolicy};
use super::prompt::render_prompt;
use crate::agent::{domain::AgentRequest, services::AgentRegistry};
use crate::job::{
    domain::{
        Attempt, AttemptOutcome, Job, JobId, JobKind, JobStatus, Unit, UnitDefinition,
        UnitId, UnitResult, UnitStatus,
    },
    ports::{CatalogError, JobStore, JobStoreError, UnitCatalog},
};
use crate::provider::{
    domain::RepositorySnapshot,
    ports::ProviderError,
    services::{ProviderRegistry, ProviderRegistryError},
};
use mockable::Clock;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that stop a pipeline before or between units.
///
/// Failures of a single unit are not errors; they are recorded on the unit.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Unit definitions could not be loaded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// The job's provider is not registered.
    #[error(transparent)]
    ProviderRegistry(#[from] ProviderRegistryError),
    /// Repository content could not be fetched.
    #[error("repository fetch failed: {0}")]
    Provider(#[from] ProviderError),
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] JobStoreError),
    /// The job disappeared from the store.
    #[error("job not found: {0}")]
    JobNotFound(JobId),
    /// A stored unit has no matching definition.
    #[error("no definition for unit '{name}' at position {ordinal}")]
    MissingDefinition {
        /// Unit name.
        name: String,
        /// Unit ordinal.
        ordinal: u32,
    },
}

/// External collaborators the pipeline calls.
#[derive(Clone)]
pub struct Collaborators {
    /// Source of review rules and report sections.
    pub catalog: Arc<dyn UnitCatalog>,
    /// Agent clients by name.
    pub agents: AgentRegistry,
    /// Provider clients by name.
    pub providers: ProviderRegistry,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("agents", &self.agents)
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}

/// Policy and deadlines the executor applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Failure policy.
    pub policy: PipelinePolicy,
    /// Deadline for units without their own timeout.
    pub default_unit_timeout: Duration,
}

/// How a single unit execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// The unit produced a result.
    Completed,
    /// The unit failed; the message is stored on the unit.
    Failed(String),
}

/// A unit that failed during a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    /// Unit name.
    pub name: String,
    /// Failure message.
    pub message: String,
}

/// Summary of a pipeline run that reached its end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Number of units in the pipeline.
    pub total: u32,
    /// Units completed, including ones completed by an earlier run.
    pub completed: u32,
    /// Units that failed in this run.
    pub failures: Vec<UnitFailure>,
    /// Units left unstarted because the pipeline stopped early.
    pub not_run: u32,
}

impl PipelineReport {
    /// Returns a one-line description of the failures, if any.
    #[must_use]
    pub fn failure_summary(&self) -> Option<String> {
        if self.failures.is_empty() && self.not_run == 0 {
            return None;
        }
        let mut summary = format!(
            "{} of {} units failed",
            self.failures.len(),
            self.total
        );
        if self.not_run > 0 {
            let _written = write!(summary, ", {} not run", self.not_run);
        }
        for failure in &self.failures {
            let _written = write!(summary, "; {}: {}", failure.name, failure.message);
        }
        Some(summary)
    }
}

impl PipelinePolicy {
    /// Maps a finished run onto the job's terminal status and error
    /// message.
    ///
    /// Stopping early always fails the job, so a completed job has run
    /// every unit. A run in which no unit completed always fails.
    #[must_use]
    pub fn final_status(&self, report: &PipelineReport) -> (JobStatus, Option<String>) {
        let summary = report.failure_summary();
        let accept_partial = self.completion == CompletionPolicy::AllowPartial
            && self.on_unit_failure == UnitFailurePolicy::ContinueOnFailure
            && report.not_run == 0
            && report.completed > 0;
        match summary {
            None => (JobStatus::Completed, None),
            Some(_) if accept_partial => (JobStatus::Completed, None),
            Some(message) => (JobStatus::Failed, Some(message)),
        }
    }
}

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every unit was visited, or the policy stopped the run.
    Finished(PipelineReport),
    /// The job left `Running` between units.
    Aborted {
        /// Status observed at the unit boundary.
        observed: JobStatus,
        /// Units the run moved past before stopping.
        completed_units: u32,
    },
}

/// Executes a job's units against agent and provider clients.
pub struct PipelineExecutor<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    collaborators: Collaborators,
    settings: PipelineSettings,
}

impl<S, C> Clone for PipelineExecutor<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            collaborators: self.collaborators.clone(),
            settings: self.settings,
        }
    }
}

impl<S, C> PipelineExecutor<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    /// Creates an executor.
    #[must_use]
    pub const fn new(
        store: Arc<S>,
        clock: Arc<C>,
        collaborators: Collaborators,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            clock,
            collaborators,
            settings,
        }
    }

    /// Returns the executor's settings.
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs every unit of a `Running` job in order.
    ///
    /// Units already `Completed` by an earlier run are skipped and keep
    /// their results. The progress cursor is persisted after each unit.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when definitions, repository content or
    /// the store are unavailable.
    pub async fn run(&self, job: &Job) -> Result<PipelineOutcome, PipelineError> {
        let definitions = self.collaborators.catalog.units_for(job).await?;
        let units = self.ensure_units(job, &definitions).await?;
        let total = u32::try_from(units.len()).unwrap_or(u32::MAX);
        self.store.set_total_units(job.id(), total).await?;
        let snapshot = self.fetch_snapshot(job).await?;

        let mut report = PipelineReport {
            total,
            ..PipelineReport::default()
        };
        let mut cursor = 0_u32;
        for unit in &units {
            let observed = self.current_status(job.id()).await?;
            if observed != JobStatus::Running {
                tracing::info!(
                    job_id = %job.id(),
                    status = %observed,
                    next_unit = unit.name(),
                    "job left running state, stopping before next unit"
                );
                return Ok(PipelineOutcome::Aborted {
                    observed,
                    completed_units: cursor,
                });
            }

            let outcome = if unit.status() == UnitStatus::Completed {
                tracing::debug!(job_id = %job.id(), unit = unit.name(), "unit already completed");
                UnitOutcome::Completed
            } else {
                let definition = definition_for(&definitions, unit)?;
                if self.claim_unit(unit.id()).await? {
                    self.execute_unit(job, definition, unit.id(), &snapshot).await?
                } else {
                    UnitOutcome::Failed(format!("unit '{}' could not be claimed", unit.name()))
                }
            };

            cursor = cursor.saturating_add(1);
            self.store.update_progress(job.id(), cursor).await?;

            match outcome {
                UnitOutcome::Completed => report.completed = report.completed.saturating_add(1),
                UnitOutcome::Failed(message) => {
                    report.failures.push(UnitFailure {
                        name: unit.name().to_owned(),
                        message,
                    });
                    if self.settings.policy.on_unit_failure == UnitFailurePolicy::StopOnFailure {
                        report.not_run = total.saturating_sub(cursor);
                        tracing::info!(
                            job_id = %job.id(),
                            unit = unit.name(),
                            not_run = report.not_run,
                            "stopping pipeline after unit failure"
                        );
                        break;
                    }
                }
            }
        }

        Ok(PipelineOutcome::Finished(report))
    }

    /// Re-runs one unit that the caller has already moved to `Running`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the job, its definitions or its
    /// repository content are unavailable.
    pub async fn rerun_unit(&self, job_id: JobId, unit_id: UnitId) -> Result<Unit, PipelineError> {
        let job = self
            .store
            .find_job(job_id)
            .await?
            .ok_or(PipelineError::JobNotFound(job_id))?;
        let unit = self
            .store
            .find_unit(unit_id)
            .await?
            .ok_or(JobStoreError::UnitNotFound(unit_id))?;
        let definitions = self.collaborators.catalog.units_for(&job).await?;
        let definition = definition_for(&definitions, &unit)?;
        let snapshot = self.fetch_snapshot(&job).await?;
        self.execute_unit(&job, definition, unit_id, &snapshot)
            .await?;
        self.store
            .find_unit(unit_id)
            .await?
            .ok_or_else(|| JobStoreError::UnitNotFound(unit_id).into())
    }

    /// Posts a findings summary on the reviewed pull request.
    ///
    /// Does nothing unless comment publishing is enabled and the job is a
    /// pull request review. Failures are logged only.
    pub async fn publish_review_comment(&self, job: &Job) {
        if !self.settings.policy.publish_review_comments {
            return;
        }
        let Some(review) = job.review() else {
            return;
        };
        let Some(pull_request) = review.pull_request() else {
            return;
        };

        let units = match self.store.find_units(job.id()).await {
            Ok(units) => units,
            Err(err) => {
                tracing::warn!(job_id = %job.id(), error = %err, "could not load units for review comment");
                return;
            }
        };
        let body = review_comment(review.revision_count(), &units);
        let client = match self.collaborators.providers.get(job.repository().provider()) {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(job_id = %job.id(), error = %err, "no provider for review comment");
                return;
            }
        };
        match client.post_comment(pull_request, &body).await {
            Ok(()) => tracing::info!(job_id = %job.id(), pr_url = pull_request.url(), "posted review comment"),
            Err(err) => {
                tracing::warn!(job_id = %job.id(), pr_url = pull_request.url(), error = %err, "posting review comment failed");
            }
        }
    }

    async fn ensure_units(
        &self,
        job: &Job,
        definitions: &[UnitDefinition],
    ) -> Result<Vec<Unit>, PipelineError> {
        let existing = self.store.find_units(job.id()).await?;
        if !existing.is_empty() {
            return Ok(existing);
        }
        let now = self.clock.utc();
        let units: Vec<Unit> = definitions
            .iter()
            .zip(0_u32..)
            .map(|(definition, ordinal)| Unit::new(job.id(), ordinal, definition, now))
            .collect();
        self.store.create_units(&units).await?;
        Ok(units)
    }

    async fn fetch_snapshot(&self, job: &Job) -> Result<RepositorySnapshot, PipelineError> {
        let client = self
            .collaborators
            .providers
            .get(job.repository().provider())?;
        let pinned = job.review().and_then(|review| review.commit_sha());
        Ok(client.fetch_repository(job.repository(), pinned).await?)
    }

    async fn current_status(&self, job_id: JobId) -> Result<JobStatus, PipelineError> {
        self.store
            .find_job(job_id)
            .await?
            .map(|job| job.status())
            .ok_or(PipelineError::JobNotFound(job_id))
    }

    async fn claim_unit(&self, unit_id: UnitId) -> Result<bool, PipelineError> {
        // `Running` is allowed so a unit interrupted by a crashed worker can
        // be picked up again.
        let claimed = self
            .store
            .update_unit_status_if_allowed(
                unit_id,
                UnitStatus::Running,
                &[UnitStatus::Pending, UnitStatus::Failed, UnitStatus::Running],
                self.clock.utc(),
            )
            .await?;
        Ok(claimed == 1)
    }

    async fn execute_unit(
        &self,
        job: &Job,
        definition: &UnitDefinition,
        unit_id: UnitId,
        snapshot: &RepositorySnapshot,
    ) -> Result<UnitOutcome, PipelineError> {
        let mut unit = self
            .store
            .find_unit(unit_id)
            .await?
            .ok_or(JobStoreError::UnitNotFound(unit_id))?;
        let attempt_number = u32::try_from(self.store.find_attempts(unit_id).await?.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        let timeout = definition
            .timeout()
            .unwrap_or(self.settings.default_unit_timeout);

        tracing::debug!(
            job_id = %job.id(),
            unit = unit.name(),
            attempt = attempt_number,
            agent = %definition.agent(),
            "starting unit"
        );
        let started_at = self.clock.utc();
        let (outcome, raw_output, result) = self
            .invoke_agent(job, definition, unit.ordinal(), snapshot, timeout)
            .await;
        let finished_at = self.clock.utc();

        let attempt = Attempt::new(
            unit_id,
            attempt_number,
            started_at,
            finished_at,
            outcome.clone(),
            raw_output.as_deref(),
        );
        self.store.append_attempt(&attempt).await?;

        let unit_outcome = match result {
            Some(value) => {
                unit.complete(value, finished_at).map_err(JobStoreError::from)?;
                tracing::info!(job_id = %job.id(), unit = unit.name(), attempt = attempt_number, "unit completed");
                UnitOutcome::Completed
            }
            None => {
                let message = outcome
                    .failure_message()
                    .unwrap_or_else(|| "unit failed".to_owned());
                unit.fail(message.clone(), finished_at)
                    .map_err(JobStoreError::from)?;
                tracing::warn!(
                    job_id = %job.id(),
                    unit = unit.name(),
                    attempt = attempt_number,
                    error = %message,
                    "unit failed"
                );
                UnitOutcome::Failed(message)
            }
        };
        self.store.update_unit(&unit).await?;
        Ok(unit_outcome)
    }

    async fn invoke_agent(
        &self,
        job: &Job,
        definition: &UnitDefinition,
        ordinal: u32,
        snapshot: &RepositorySnapshot,
        timeout: Duration,
    ) -> (AttemptOutcome, Option<String>, Option<UnitResult>) {
        let prompt = match render_prompt(definition, ordinal, job, snapshot) {
            Ok(prompt) => prompt,
            Err(message) => return failed(format!("prompt template error: {message}"), None),
        };
        let client = match self.collaborators.agents.get(definition.agent()) {
            Ok(client) => client,
            Err(err) => return failed(err.to_string(), None),
        };
        let request = AgentRequest {
            agent: definition.agent().clone(),
            job_id: job.id(),
            unit_name: definition.name().to_owned(),
            prompt,
            content: snapshot.render_content(),
            timeout,
        };

        let response = match tokio::time::timeout(timeout, client.execute(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return failed(err.to_string(), None),
            Err(_) => {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                return (AttemptOutcome::TimedOut { timeout_ms }, None, None);
            }
        };

        let parsed = match job.kind() {
            JobKind::Review => UnitResult::parse_findings(&response.output),
            JobKind::Report => UnitResult::parse_section(&response.output),
        };
        match parsed {
            Ok(result) => (AttemptOutcome::Succeeded, Some(response.output), Some(result)),
            Err(err) => failed(err.to_string(), Some(response.output)),
        }
    }
}

fn failed(
    message: String,
    raw_output: Option<String>,
) -> (AttemptOutcome, Option<String>, Option<UnitResult>) {
    (AttemptOutcome::Failed { message }, raw_output, None)
}

fn definition_for<'a>(
    definitions: &'a [UnitDefinition],
    unit: &Unit,
) -> Result<&'a UnitDefinition, PipelineError> {
    usize::try_from(unit.ordinal())
        .ok()
        .and_then(|index| definitions.get(index))
        .filter(|definition| definition.name() == unit.name())
        .or_else(|| {
            definitions
                .iter()
                .find(|definition| definition.name() == unit.name())
        })
        .ok_or_else(|| PipelineError::MissingDefinition {
            name: unit.name().to_owned(),
            ordinal: unit.ordinal(),
        })
}

fn review_comment(revision: u32, units: &[Unit]) -> String {
    let mut findings: Vec<_> = units
        .iter()
        .filter_map(Unit::result)
        .flat_map(UnitResult::findings)
        .collect();
    findings.sort_by(|left, right| right.severity.cmp(&left.severity));

    let mut body = format!("## Automated review (revision {revision})\n\n");
    if findings.is_empty() {
        body.push_str("No findings.\n");
        return body;
    }
    let _written = writeln!(body, "{} findings:\n", findings.len());
    for finding in findings {
        let location = match (&finding.file, finding.line) {
            (Some(file), Some(line)) => format!(" ({file}:{line})"),
            (Some(file), None) => format!(" ({file})"),
            (None, _) => String::new(),
        };
        let _written = writeln!(
            body,
            "- **{}** [{}] {}{location}",
            finding.severity, finding.category, finding.description
        );
    }
    body
}
