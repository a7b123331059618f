//! Engine and pipeline configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// What `Submit` does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitMode {
    /// Fail immediately with `Unavailable`.
    #[default]
    FailFast,
    /// Wait until a slot frees up.
    Block,
    /// Wait up to the given duration, then fail with `SubmitTimeout`.
    BlockFor(Duration),
}

/// What the pipeline does after a unit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFailurePolicy {
    /// Run the remaining units.
    #[default]
    ContinueOnFailure,
    /// Leave the remaining units `Pending` and fail the job.
    StopOnFailure,
}

/// How unit failures map onto the job's terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// The job completes only if every unit completed.
    #[default]
    RequireAllUnits,
    /// The job completes once every unit ran and at least one completed,
    /// with failures recorded on the units.
    AllowPartial,
}

/// Named pipeline failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelinePolicy {
    /// Behaviour after a unit failure.
    pub on_unit_failure: UnitFailurePolicy,
    /// Mapping of unit failures to the job status.
    pub completion: CompletionPolicy,
    /// Post a findings summary on the pull request after a completed review.
    pub publish_review_comments: bool,
}

impl PipelinePolicy {
    /// Best-effort continuation with partial results accepted.
    #[must_use]
    pub const fn best_effort() -> Self {
        Self {
            on_unit_failure: UnitFailurePolicy::ContinueOnFailure,
            completion: CompletionPolicy::AllowPartial,
            publish_review_comments: false,
        }
    }

    /// Stop at the first failed unit.
    #[must_use]
    pub const fn stop_on_failure() -> Self {
        Self {
            on_unit_failure: UnitFailurePolicy::StopOnFailure,
            completion: CompletionPolicy::RequireAllUnits,
            publish_review_comments: false,
        }
    }

    /// Enables or disables review comment publishing.
    #[must_use]
    pub const fn with_review_comments(mut self, enabled: bool) -> Self {
        self.publish_review_comments = enabled;
        self
    }
}

/// Errors returned by [`EngineConfig::validate`].
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The worker pool must have at least one worker.
    #[error("worker_count must be at least 1")]
    ZeroWorkers,
    /// The queue must hold at least one job.
    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,
    /// Units need a non-zero deadline.
    #[error("default_unit_timeout must be greater than zero")]
    ZeroUnitTimeout,
    /// A job timeout, when set, must be non-zero.
    #[error("job_timeout must be greater than zero")]
    ZeroJobTimeout,
    /// The reaper needs a non-zero tick.
    #[error("reaper_interval must be greater than zero")]
    ZeroReaperInterval,
}

/// Job engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of concurrent workers.
    pub worker_count: usize,
    /// Maximum number of queued jobs.
    pub queue_capacity: usize,
    /// Default behaviour of `Submit` on a full queue.
    pub submit_mode: SubmitMode,
    /// Deadline for units without their own timeout.
    pub default_unit_timeout: Duration,
    /// Wall-clock limit for a running job; `None` disables the reaper.
    pub job_timeout: Option<Duration>,
    /// How often the reaper looks for expired jobs.
    pub reaper_interval: Duration,
    /// Pipeline failure policy.
    pub pipeline: PipelinePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_capacity: 64,
            submit_mode: SubmitMode::FailFast,
            default_unit_timeout: Duration::from_secs(300),
            job_timeout: None,
            reaper_interval: Duration::from_secs(30),
            pipeline: PipelinePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Sets the worker count.
    #[must_use]
    pub const fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Sets the queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Sets the default submit mode.
    #[must_use]
    pub const fn with_submit_mode(mut self, submit_mode: SubmitMode) -> Self {
        self.submit_mode = submit_mode;
        self
    }

    /// Sets the default unit deadline.
    #[must_use]
    pub const fn with_unit_timeout(mut self, timeout: Duration) -> Self {
        self.default_unit_timeout = timeout;
        self
    }

    /// Enables the job timeout reaper.
    #[must_use]
    pub const fn with_job_timeout(mut self, timeout: Duration, interval: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self.reaper_interval = interval;
        self
    }

    /// Sets the pipeline policy.
    #[must_use]
    pub const fn with_pipeline(mut self, pipeline: PipelinePolicy) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Checks the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.default_unit_timeout.is_zero() {
            return Err(ConfigError::ZeroUnitTimeout);
        }
        if matches!(self.job_timeout, Some(timeout) if timeout.is_zero()) {
            return Err(ConfigError::ZeroJobTimeout);
        }
        if self.reaper_interval.is_zero() {
            return Err(ConfigError::ZeroReaperInterval);
        }
        Ok(())
    }
}
