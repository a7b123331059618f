//! Units (rule runs and report sections) and their immutable attempts.

use super::{AttemptId, JobDomainError, JobId, UnitId, UnitResult, UnitStatus};
use crate::agent::domain::AgentName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Configured definition of one pipeline step.
///
/// Review jobs run one definition per rule; report jobs one per section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDefinition {
    name: String,
    agent: AgentName,
    prompt_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
}

impl UnitDefinition {
    /// Creates a validated unit definition.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::EmptyUnitName`] for a blank name.
    pub fn new(
        name: impl Into<String>,
        agent: AgentName,
        prompt_template: impl Into<String>,
    ) -> Result<Self, JobDomainError> {
        let raw = name.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(JobDomainError::EmptyUnitName);
        }
        Ok(Self {
            name: trimmed.to_owned(),
            agent,
            prompt_template: prompt_template.into(),
            timeout_secs: None,
        })
    }

    /// Overrides the engine's default unit timeout for this definition.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Returns the unit name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the agent that executes this unit.
    #[must_use]
    pub const fn agent(&self) -> &AgentName {
        &self.agent
    }

    /// Returns the `minijinja` prompt template.
    #[must_use]
    pub fn prompt_template(&self) -> &str {
        &self.prompt_template
    }

    /// Returns the per-unit timeout override, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Ordered sub-step of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    id: UnitId,
    job_id: JobId,
    ordinal: u32,
    name: String,
    status: UnitStatus,
    retry_count: u32,
    error_message: Option<String>,
    result: Option<UnitResult>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedUnitData {
    /// Persisted unit identifier.
    pub id: UnitId,
    /// Owning job.
    pub job_id: JobId,
    /// Zero-based position in the pipeline.
    pub ordinal: u32,
    /// Unit name from its definition.
    pub name: String,
    /// Persisted lifecycle status.
    pub status: UnitStatus,
    /// Persisted retry counter.
    pub retry_count: u32,
    /// Persisted failure message.
    pub error_message: Option<String>,
    /// Persisted result of the latest successful attempt.
    pub result: Option<UnitResult>,
    /// Persisted last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Unit {
    /// Creates a `Pending` unit for `definition` at position `ordinal`.
    #[must_use]
    pub fn new(
        job_id: JobId,
        ordinal: u32,
        definition: &UnitDefinition,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UnitId::new(),
            job_id,
            ordinal,
            name: definition.name().to_owned(),
            status: UnitStatus::Pending,
            retry_count: 0,
            error_message: None,
            result: None,
            updated_at: at,
        }
    }

    /// Reconstructs a unit from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedUnitData) -> Self {
        Self {
            id: data.id,
            job_id: data.job_id,
            ordinal: data.ordinal,
            name: data.name,
            status: data.status,
            retry_count: data.retry_count,
            error_message: data.error_message,
            result: data.result,
            updated_at: data.updated_at,
        }
    }

    /// Returns the unit identifier.
    #[must_use]
    pub const fn id(&self) -> UnitId {
        self.id
    }

    /// Returns the owning job identifier.
    #[must_use]
    pub const fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Returns the zero-based pipeline position.
    #[must_use]
    pub const fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Returns the unit name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> UnitStatus {
        self.status
    }

    /// Returns how many times the unit has been re-run.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the latest failure message.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Returns the result of the latest successful attempt.
    #[must_use]
    pub const fn result(&self) -> Option<&UnitResult> {
        self.result.as_ref()
    }

    /// Returns the last-modified timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Applies a state-machine transition.
    ///
    /// Re-entering `Running` from `Failed` or `Running` counts as a retry.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidUnitTransition`] when the state
    /// machine does not permit the move.
    pub fn transition_to(
        &mut self,
        target: UnitStatus,
        at: DateTime<Utc>,
    ) -> Result<(), JobDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(JobDomainError::InvalidUnitTransition {
                unit_id: self.id,
                from: self.status,
                to: target,
            });
        }
        if target == UnitStatus::Running && self.status != UnitStatus::Pending {
            self.retry_count = self.retry_count.saturating_add(1);
        }
        self.status = target;
        self.updated_at = at;
        Ok(())
    }

    /// Marks a running unit completed with its result.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidUnitTransition`] unless the unit is
    /// running.
    pub fn complete(&mut self, result: UnitResult, at: DateTime<Utc>) -> Result<(), JobDomainError> {
        self.transition_to(UnitStatus::Completed, at)?;
        self.result = Some(result);
        self.error_message = None;
        Ok(())
    }

    /// Marks a running unit failed.
    ///
    /// A result from an earlier successful attempt is kept.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidUnitTransition`] unless the unit is
    /// running.
    pub fn fail(&mut self, message: impl Into<String>, at: DateTime<Utc>) -> Result<(), JobDomainError> {
        self.transition_to(UnitStatus::Failed, at)?;
        self.error_message = Some(message.into());
        Ok(())
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The agent produced a parseable result.
    Succeeded,
    /// The agent call or output parsing failed.
    Failed {
        /// Failure description.
        message: String,
    },
    /// The attempt exceeded its deadline.
    TimedOut {
        /// Deadline that was exceeded, in milliseconds.
        timeout_ms: u64,
    },
}

impl AttemptOutcome {
    /// Returns `true` for successful attempts.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns a human-readable failure description, if the attempt failed.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::Succeeded => None,
            Self::Failed { message } => Some(message.clone()),
            Self::TimedOut { timeout_ms } => Some(format!("timed out after {timeout_ms} ms")),
        }
    }
}

/// Immutable record of one unit execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    id: AttemptId,
    unit_id: UnitId,
    number: u32,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    outcome: AttemptOutcome,
    output_digest: Option<String>,
}

/// Parameter object for reconstructing a persisted attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedAttemptData {
    /// Persisted attempt identifier.
    pub id: AttemptId,
    /// Unit the attempt belongs to.
    pub unit_id: UnitId,
    /// One-based attempt number within the unit.
    pub number: u32,
    /// Execution start.
    pub started_at: DateTime<Utc>,
    /// Execution end.
    pub finished_at: DateTime<Utc>,
    /// Persisted outcome.
    pub outcome: AttemptOutcome,
    /// SHA-256 digest of the raw agent output.
    pub output_digest: Option<String>,
}

impl Attempt {
    /// Records a finished attempt, hashing the raw agent output if present.
    #[must_use]
    pub fn new(
        unit_id: UnitId,
        number: u32,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        outcome: AttemptOutcome,
        raw_output: Option<&str>,
    ) -> Self {
        Self {
            id: AttemptId::new(),
            unit_id,
            number,
            started_at,
            finished_at,
            outcome,
            output_digest: raw_output.map(output_digest),
        }
    }

    /// Reconstructs an attempt from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedAttemptData) -> Self {
        Self {
            id: data.id,
            unit_id: data.unit_id,
            number: data.number,
            started_at: data.started_at,
            finished_at: data.finished_at,
            outcome: data.outcome,
            output_digest: data.output_digest,
        }
    }

    /// Returns the attempt identifier.
    #[must_use]
    pub const fn id(&self) -> AttemptId {
        self.id
    }

    /// Returns the unit the attempt belongs to.
    #[must_use]
    pub const fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    /// Returns the one-based attempt number.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Returns when execution started.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns when execution finished.
    #[must_use]
    pub const fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Returns the outcome.
    #[must_use]
    pub const fn outcome(&self) -> &AttemptOutcome {
        &self.outcome
    }

    /// Returns the hex SHA-256 digest referencing the raw agent output.
    #[must_use]
    pub fn output_digest(&self) -> Option<&str> {
        self.output_digest.as_deref()
    }
}

/// Hex-encoded SHA-256 digest of raw agent output.
#[must_use]
pub fn output_digest(raw_output: &str) -> String {
    Sha256::digest(raw_output.as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
