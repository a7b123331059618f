//! Job engine: bounded queue, fixed worker pool and lifecycle operations.
//!
//! Every status change that matters for correctness goes through
//! [`JobStore::update_status_if_allowed`]. The store is the only source of
//! truth for job status; the engine keeps a private set of claimed job
//! identifiers so it knows whether a worker or an external actor (cancel,
//! timeout reaper) is responsible for firing terminal callbacks.

use super::activity::ActivityTracker;
use super::config::{ConfigError, EngineConfig, SubmitMode};
use super::pipeline::{
    Collaborators, PipelineError, PipelineExecutor, PipelineOutcome, PipelineSettings,
};
use super::queue::{Enqueued, JobQueue, QueueError};
use super::reaper::{expired_jobs, timeout_message};
use crate::job::{
    domain::{Job, JobId, JobProgress, JobStatus, Unit, UnitId, UnitStatus},
    ports::{JobStore, JobStoreError},
};
use crate::notification::{domain::JobNotification, services::NotificationDispatcher};
use mockable::Clock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

const CANCEL_MESSAGE: &str = "cancelled by request";
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors returned by engine operations.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The job does not exist.
    #[error("job not found: {0}")]
    NotFound(JobId),
    /// The unit does not exist or belongs to another job.
    #[error("unit not found: {0}")]
    UnitNotFound(UnitId),
    /// The job's status does not permit the operation.
    #[error("cannot {operation} job {job_id} in status {status}")]
    InvalidState {
        /// Job identifier.
        job_id: JobId,
        /// Status observed when the operation was attempted.
        status: JobStatus,
        /// Operation that was rejected.
        operation: &'static str,
    },
    /// The unit's status does not permit a retry.
    #[error("cannot retry unit {unit_id} in status {status}")]
    InvalidUnitState {
        /// Unit identifier.
        unit_id: UnitId,
        /// Status observed when the retry was attempted.
        status: UnitStatus,
    },
    /// A worker or unit retry is still executing the job.
    #[error("job {0} is still executing")]
    Busy(JobId),
    /// The queue is full or the engine is shutting down.
    #[error("engine unavailable")]
    Unavailable,
    /// Blocking submission did not find queue capacity in time.
    #[error("submission timed out after {0:?}")]
    SubmitTimeout(Duration),
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] JobStoreError),
    /// The pipeline could not run.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// A spawned unit retry did not run to completion.
    #[error("unit retry task failed: {0}")]
    Interrupted(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Hook invoked with the stored job after it reaches a terminal status.
pub type JobCallback = Arc<dyn Fn(&Job) + Send + Sync>;

#[derive(Default, Clone)]
struct JobCallbacks {
    on_complete: Option<JobCallback>,
    on_error: Option<JobCallback>,
}

struct EngineInner<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    executor: PipelineExecutor<S, C>,
    notifications: NotificationDispatcher,
    config: EngineConfig,
    queue: JobQueue,
    callbacks: RwLock<JobCallbacks>,
    claims: tokio::sync::Mutex<HashSet<JobId>>,
    activity: Arc<ActivityTracker>,
    unit_retries: Arc<ActivityTracker>,
    stopping: AtomicBool,
    started: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

/// Concurrent job engine.
///
/// Clones share the same queue, workers and callbacks.
pub struct JobEngine<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    inner: Arc<EngineInner<S, C>>,
}

impl<S, C> Clone for JobEngine<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, C> std::fmt::Debug for JobEngine<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobEngine")
            .field("config", &self.inner.config)
            .field("closed", &self.inner.queue.is_closed())
            .finish_non_exhaustive()
    }
}

impl<S, C> JobEngine<S, C>
where
    S: JobStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates an engine. Workers start on [`Self::start`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` is invalid.
    pub fn new(
        store: Arc<S>,
        clock: Arc<C>,
        collaborators: Collaborators,
        notifications: NotificationDispatcher,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let executor = PipelineExecutor::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            collaborators,
            PipelineSettings {
                policy: config.pipeline,
                default_unit_timeout: config.default_unit_timeout,
            },
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                store,
                clock,
                executor,
                notifications,
                queue: JobQueue::new(config.queue_capacity),
                config,
                callbacks: RwLock::new(JobCallbacks::default()),
                claims: tokio::sync::Mutex::new(HashSet::new()),
                activity: Arc::new(ActivityTracker::default()),
                unit_retries: Arc::new(ActivityTracker::default()),
                stopping: AtomicBool::new(false),
                started: AtomicBool::new(false),
                workers: Mutex::new(Vec::new()),
                reaper: Mutex::new(None),
            }),
        })
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Spawns the worker pool and, when a job timeout is configured, the
    /// timeout reaper. Calling it again has no effect.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let workers: Vec<_> = (0..self.inner.config.worker_count)
            .map(|worker| tokio::spawn(worker_loop(Arc::clone(&self.inner), worker)))
            .collect();
        *lock(&self.inner.workers) = workers;

        if let Some(timeout) = self.inner.config.job_timeout {
            let reaper = tokio::spawn(reaper_loop(
                Arc::clone(&self.inner),
                timeout,
                self.inner.config.reaper_interval,
            ));
            *lock(&self.inner.reaper) = Some(reaper);
        }
        tracing::info!(
            workers = self.inner.config.worker_count,
            queue_capacity = self.inner.config.queue_capacity,
            "job engine started"
        );
    }

    /// Registers hooks fired once per terminal transition, after the store
    /// has been updated.
    ///
    /// `on_complete` receives `Completed` jobs. `on_error` receives `Failed`
    /// and `Cancelled` jobs.
    pub fn set_callbacks<F, G>(&self, on_complete: F, on_error: G)
    where
        F: Fn(&Job) + Send + Sync + 'static,
        G: Fn(&Job) + Send + Sync + 'static,
    {
        let mut callbacks = self
            .inner
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        callbacks.on_complete = Some(Arc::new(on_complete));
        callbacks.on_error = Some(Arc::new(on_error));
    }

    /// Removes both callbacks.
    pub fn clear_callbacks(&self) {
        *self
            .inner
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner) = JobCallbacks::default();
    }

    /// Enqueues a `Pending` job using the configured submission mode.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`], [`EngineError::InvalidState`] for
    /// jobs that are not `Pending`, [`EngineError::Unavailable`] when the
    /// queue is full or closed, or [`EngineError::SubmitTimeout`].
    pub async fn submit(&self, job: &Job) -> EngineResult<JobHandle<S, C>> {
        self.submit_with(job, self.inner.config.submit_mode).await
    }

    /// Enqueues a `Pending` job using an explicit submission mode.
    ///
    /// # Errors
    ///
    /// See [`Self::submit`].
    pub async fn submit_with(&self, job: &Job, mode: SubmitMode) -> EngineResult<JobHandle<S, C>> {
        self.ensure_accepting()?;
        let stored = self.inner.find(job.id()).await?;
        if stored.status() != JobStatus::Pending {
            return Err(EngineError::InvalidState {
                job_id: stored.id(),
                status: stored.status(),
                operation: "submit",
            });
        }
        self.enqueue(stored.id(), mode).await
    }

    /// Returns a failed or cancelled job to `Pending` and resubmits it.
    ///
    /// The failure summary is cleared and the retry counter incremented by
    /// one in the same conditional update. Units that already completed keep their results and are not
    /// run again.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`], [`EngineError::InvalidState`]
    /// unless the job is `Failed` or `Cancelled`, [`EngineError::Busy`]
    /// while a worker or unit retry still executes the job, or any
    /// submission error. A job whose resubmission fails stays `Pending`.
    pub async fn retry(&self, job_id: JobId) -> EngineResult<JobHandle<S, C>> {
        self.ensure_accepting()?;
        let job = self.inner.find(job_id).await?;
        if !job.status().is_retryable() {
            return Err(EngineError::InvalidState {
                job_id,
                status: job.status(),
                operation: "retry",
            });
        }

        let rows = {
            let claims = self.inner.claims.lock().await;
            if claims.contains(&job_id) || self.inner.unit_retries.is_active(job_id) {
                return Err(EngineError::Busy(job_id));
            }
            self.inner
                .store
                .update_status_if_allowed(
                    job_id,
                    JobStatus::Pending,
                    &[JobStatus::Failed, JobStatus::Cancelled],
                    self.inner.clock.utc(),
                    None,
                )
                .await?
        };
        if rows == 0 {
            let current = self.inner.find(job_id).await?;
            return Err(EngineError::InvalidState {
                job_id,
                status: current.status(),
                operation: "retry",
            });
        }

        tracing::info!(
            job_id = %job_id,
            retry_count = job.retry_count().saturating_add(1),
            "job reset for retry"
        );
        self.enqueue(job_id, self.inner.config.submit_mode).await
    }

    /// Re-runs one failed unit of a terminal job in the background.
    ///
    /// The job's status is left unchanged; a later [`Self::retry`] skips
    /// the unit if it now completed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`], [`EngineError::UnitNotFound`],
    /// [`EngineError::InvalidUnitState`] unless the unit is `Failed`,
    /// [`EngineError::InvalidState`] unless the job is terminal, or
    /// [`EngineError::Busy`] while a worker still holds the job.
    pub async fn retry_unit(&self, job_id: JobId, unit_id: UnitId) -> EngineResult<UnitRetryHandle> {
        self.ensure_accepting()?;
        let guard = {
            let claims = self.inner.claims.lock().await;
            self.ensure_accepting()?;
            let job = self.inner.find(job_id).await?;
            let unit = self
                .inner
                .store
                .find_unit(unit_id)
                .await?
                .filter(|unit| unit.job_id() == job_id)
                .ok_or(EngineError::UnitNotFound(unit_id))?;
            if unit.status() != UnitStatus::Failed {
                return Err(EngineError::InvalidUnitState {
                    unit_id,
                    status: unit.status(),
                });
            }
            if !job.status().is_terminal() {
                return Err(EngineError::InvalidState {
                    job_id,
                    status: job.status(),
                    operation: "retry a unit of",
                });
            }
            if claims.contains(&job_id) {
                return Err(EngineError::Busy(job_id));
            }
            let rows = self
                .inner
                .store
                .update_unit_status_if_allowed(
                    unit_id,
                    UnitStatus::Running,
                    &[UnitStatus::Failed],
                    self.inner.clock.utc(),
                )
                .await?;
            if rows == 0 {
                return Err(EngineError::InvalidUnitState {
                    unit_id,
                    status: UnitStatus::Running,
                });
            }
            self.inner.unit_retries.track(job_id)
        };

        tracing::info!(job_id = %job_id, unit_id = %unit_id, "retrying unit");
        let executor = self.inner.executor.clone();
        let task = tokio::spawn(async move {
            let _in_flight = guard;
            let result = executor.rerun_unit(job_id, unit_id).await;
            if let Err(err) = &result {
                tracing::warn!(job_id = %job_id, unit_id = %unit_id, error = %err, "unit retry failed");
            }
            result.map_err(EngineError::from)
        });
        Ok(UnitRetryHandle {
            job_id,
            unit_id,
            task,
        })
    }

    /// Cancels a `Pending` or `Running` job.
    ///
    /// A running job stops before its next unit; the unit in flight runs
    /// to completion.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] or [`EngineError::InvalidState`]
    /// when the job is already terminal.
    pub async fn cancel(&self, job_id: JobId) -> EngineResult<Job> {
        let changed = self
            .inner
            .transition_external(
                job_id,
                JobStatus::Cancelled,
                &[JobStatus::Pending, JobStatus::Running],
                Some(CANCEL_MESSAGE.to_owned()),
            )
            .await?;
        let job = self.inner.find(job_id).await?;
        if changed {
            tracing::info!(job_id = %job_id, "job cancelled");
            Ok(job)
        } else {
            Err(EngineError::InvalidState {
                job_id,
                status: job.status(),
                operation: "cancel",
            })
        }
    }

    /// Returns the job's progress cursor, unit total, status and failure
    /// summary.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] or [`EngineError::Store`].
    pub async fn get_progress(&self, job_id: JobId) -> EngineResult<JobProgress> {
        Ok(self.inner.find(job_id).await?.progress())
    }

    /// Enqueues every stored `Pending` job, oldest first, and returns how
    /// many were added.
    ///
    /// # Errors
    ///
    /// Returns the first store or submission error.
    pub async fn resubmit_pending(&self) -> EngineResult<usize> {
        self.ensure_accepting()?;
        let pending = self
            .inner
            .store
            .list_jobs_by_status(JobStatus::Pending)
            .await?;
        let mut added = 0_usize;
        for job in &pending {
            if self.inner.enqueue(job.id(), self.inner.config.submit_mode).await? == Enqueued::Added {
                added = added.saturating_add(1);
            }
        }
        tracing::info!(found = pending.len(), added, "resubmitted pending jobs");
        Ok(added)
    }

    /// Fails every running job older than the configured job timeout and
    /// returns how many were failed. Does nothing without a job timeout.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Store`].
    pub async fn reap_expired(&self) -> EngineResult<usize> {
        match self.inner.config.job_timeout {
            Some(timeout) => self.inner.reap_expired(timeout).await,
            None => Ok(0),
        }
    }

    /// Stops accepting work, lets workers finish their current job and
    /// waits for them and for any unit retry still running. Jobs still
    /// queued stay `Pending` in the store.
    pub async fn shutdown(&self) {
        self.inner.stopping.store(true, Ordering::Release);
        self.inner.queue.close();
        if let Some(reaper) = lock(&self.inner.reaper).take() {
            reaper.abort();
        }
        // A unit retry past its accepting check registers before releasing claims.
        drop(self.inner.claims.lock().await);
        let workers = std::mem::take(&mut *lock(&self.inner.workers));
        for worker in workers {
            if let Err(err) = worker.await {
                tracing::error!(error = %err, "worker task ended abnormally");
            }
        }
        self.inner.unit_retries_settled().await;
        tracing::info!("job engine stopped");
    }

    fn ensure_accepting(&self) -> EngineResult<()> {
        if self.inner.stopping.load(Ordering::Acquire) || self.inner.queue.is_closed() {
            Err(EngineError::Unavailable)
        } else {
            Ok(())
        }
    }

    async fn enqueue(&self, job_id: JobId, mode: SubmitMode) -> EngineResult<JobHandle<S, C>> {
        self.inner.enqueue(job_id, mode).await?;
        Ok(JobHandle {
            job_id,
            engine: self.clone(),
        })
    }
}

impl<S, C> EngineInner<S, C>
where
    S: JobStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    async fn unit_retries_settled(&self) {
        loop {
            let settled = self.unit_retries.settled().notified();
            tokio::pin!(settled);
            settled.as_mut().enable();
            if self.unit_retries.is_idle() {
                return;
            }
            settled.await;
        }
    }

    async fn find(&self, job_id: JobId) -> EngineResult<Job> {
        self.store
            .find_job(job_id)
            .await?
            .ok_or(EngineError::NotFound(job_id))
    }

    async fn enqueue(&self, job_id: JobId, mode: SubmitMode) -> EngineResult<Enqueued> {
        self.activity.acquire(job_id);
        match self.queue.enqueue(job_id, mode).await {
            Ok(Enqueued::Added) => {
                tracing::debug!(job_id = %job_id, "job enqueued");
                Ok(Enqueued::Added)
            }
            Ok(Enqueued::AlreadyQueued) => {
                self.activity.release(job_id);
                tracing::debug!(job_id = %job_id, "job already queued");
                Ok(Enqueued::AlreadyQueued)
            }
            Err(err) => {
                self.activity.release(job_id);
                tracing::warn!(job_id = %job_id, error = %err, "job not enqueued");
                Err(match err {
                    QueueError::Full | QueueError::Closed => EngineError::Unavailable,
                    QueueError::TimedOut(limit) => EngineError::SubmitTimeout(limit),
                })
            }
        }
    }

    /// Takes a dequeued job through claim, pipeline and terminal transition.
    async fn process(&self, job_id: JobId, worker: usize) -> EngineResult<()> {
        let Some(job) = self.store.find_job(job_id).await? else {
            tracing::warn!(worker, job_id = %job_id, "dequeued job no longer exists");
            return Ok(());
        };
        if job.status() != JobStatus::Pending {
            tracing::debug!(worker, job_id = %job_id, status = %job.status(), "skipping job that is not pending");
            return Ok(());
        }
        if !self.claim(job_id).await? {
            tracing::debug!(worker, job_id = %job_id, "job claimed elsewhere");
            return Ok(());
        }
        tracing::info!(worker, job_id = %job_id, kind = %job.kind(), "job claimed");

        let result = self.run_claimed(job_id).await;
        let released = self.release_claim(job_id).await;
        result.and(released)
    }

    async fn claim(&self, job_id: JobId) -> EngineResult<bool> {
        let mut claims = self.claims.lock().await;
        let rows = self
            .store
            .update_status_if_allowed(
                job_id,
                JobStatus::Running,
                &[JobStatus::Pending],
                self.clock.utc(),
                None,
            )
            .await?;
        if rows == 1 {
            claims.insert(job_id);
        }
        Ok(rows == 1)
    }

    async fn run_claimed(&self, job_id: JobId) -> EngineResult<()> {
        let job = self.find(job_id).await?;
        match self.executor.run(&job).await {
            Ok(PipelineOutcome::Finished(report)) => {
                let (status, message) = self.config.pipeline.final_status(&report);
                tracing::info!(
                    job_id = %job_id,
                    completed = report.completed,
                    failed = report.failures.len(),
                    total = report.total,
                    status = %status,
                    "pipeline finished"
                );
                self.finish_run(job_id, status, message).await
            }
            Ok(PipelineOutcome::Aborted {
                observed,
                completed_units,
            }) => {
                tracing::info!(job_id = %job_id, status = %observed, completed_units, "pipeline aborted");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(job_id = %job_id, error = %err, "pipeline error");
                self.finish_run(job_id, JobStatus::Failed, Some(err.to_string()))
                    .await
            }
        }
    }

    async fn finish_run(
        &self,
        job_id: JobId,
        status: JobStatus,
        message: Option<String>,
    ) -> EngineResult<()> {
        let rows = self
            .store
            .update_status_if_allowed(job_id, status, &[JobStatus::Running], self.clock.utc(), message)
            .await?;
        if rows == 0 {
            tracing::warn!(job_id = %job_id, target = %status, "job left running state before the run finished");
        }
        Ok(())
    }

    /// Drops the worker's claim and fires terminal hooks for the status the
    /// job ended in.
    async fn release_claim(&self, job_id: JobId) -> EngineResult<()> {
        let job = {
            let mut claims = self.claims.lock().await;
            claims.remove(&job_id);
            self.find(job_id).await?
        };
        if job.status().is_terminal() {
            self.on_terminal(&job).await;
        } else {
            tracing::warn!(job_id = %job_id, status = %job.status(), "worker released a job that is not terminal");
        }
        Ok(())
    }

    /// Applies a status change requested outside the worker pool.
    ///
    /// Terminal hooks fire here only when no worker holds the job;
    /// otherwise the worker fires them once it stops at the next unit
    /// boundary.
    async fn transition_external(
        &self,
        job_id: JobId,
        target: JobStatus,
        allowed: &[JobStatus],
        message: Option<String>,
    ) -> EngineResult<bool> {
        let _activity = self.activity.track(job_id);
        let (changed, claimed) = {
            let claims = self.claims.lock().await;
            if self.store.find_job(job_id).await?.is_none() {
                return Err(EngineError::NotFound(job_id));
            }
            let rows = self
                .store
                .update_status_if_allowed(job_id, target, allowed, self.clock.utc(), message)
                .await?;
            (rows == 1, claims.contains(&job_id))
        };
        if changed && !claimed && target.is_terminal() {
            let job = self.find(job_id).await?;
            self.on_terminal(&job).await;
        }
        Ok(changed)
    }

    async fn reap_expired(&self, timeout: Duration) -> EngineResult<usize> {
        let running = self.store.list_jobs_by_status(JobStatus::Running).await?;
        let mut reaped = 0_usize;
        for job in expired_jobs(&running, self.clock.utc(), timeout) {
            let changed = self
                .transition_external(
                    job.id(),
                    JobStatus::Failed,
                    &[JobStatus::Running],
                    Some(timeout_message(timeout)),
                )
                .await?;
            if changed {
                tracing::warn!(job_id = %job.id(), timeout = ?timeout, "job exceeded timeout");
                reaped = reaped.saturating_add(1);
            }
        }
        Ok(reaped)
    }

    async fn on_terminal(&self, job: &Job) {
        self.fire_callbacks(job);
        self.notifications
            .dispatch(&JobNotification::from_job(job, self.clock.utc()))
            .await;
        if job.status() == JobStatus::Completed {
            self.executor.publish_review_comment(job).await;
        }
    }

    fn fire_callbacks(&self, job: &Job) {
        let callbacks = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let hook = match job.status() {
            JobStatus::Completed => callbacks.on_complete,
            JobStatus::Failed | JobStatus::Cancelled => callbacks.on_error,
            JobStatus::Pending | JobStatus::Running => None,
        };
        if let Some(callback) = hook {
            callback(job);
        }
    }
}

async fn worker_loop<S, C>(inner: Arc<EngineInner<S, C>>, worker: usize)
where
    S: JobStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    tracing::debug!(worker, "worker started");
    while let Some(job_id) = inner.queue.dequeue().await {
        let _activity = inner.activity.adopt(job_id);
        if inner.stopping.load(Ordering::Acquire) {
            tracing::debug!(worker, job_id = %job_id, "engine stopping, leaving job pending");
            continue;
        }
        if let Err(err) = inner.process(job_id, worker).await {
            tracing::error!(worker, job_id = %job_id, error = %err, "job processing failed");
        }
    }
    tracing::debug!(worker, "worker stopped");
}

async fn reaper_loop<S, C>(inner: Arc<EngineInner<S, C>>, timeout: Duration, period: Duration)
where
    S: JobStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if inner.stopping.load(Ordering::Acquire) {
            break;
        }
        match inner.reap_expired(timeout).await {
            Ok(0) => {}
            Ok(reaped) => tracing::info!(reaped, "timeout reaper failed expired jobs"),
            Err(err) => tracing::error!(error = %err, "timeout reaper pass failed"),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a submitted job.
pub struct JobHandle<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    job_id: JobId,
    engine: JobEngine<S, C>,
}

impl<S, C> std::fmt::Debug for JobHandle<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}

impl<S, C> JobHandle<S, C>
where
    S: JobStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Returns the submitted job's identifier.
    #[must_use]
    pub const fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Returns the job's current progress.
    ///
    /// # Errors
    ///
    /// See [`JobEngine::get_progress`].
    pub async fn progress(&self) -> EngineResult<JobProgress> {
        self.engine.get_progress(self.job_id).await
    }

    /// Waits until the stored job is terminal and its terminal hooks have
    /// run, then returns it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] or [`EngineError::Store`].
    pub async fn wait(&self) -> EngineResult<Job> {
        let inner = &self.engine.inner;
        loop {
            let settled = inner.activity.settled().notified();
            tokio::pin!(settled);
            settled.as_mut().enable();

            let job = inner.find(self.job_id).await?;
            if job.status().is_terminal() && !inner.activity.is_active(self.job_id) {
                return Ok(job);
            }
            let _woken = tokio::time::timeout(WAIT_POLL_INTERVAL, settled).await;
        }
    }
}

/// Handle to a unit retry running in the background.
#[derive(Debug)]
pub struct UnitRetryHandle {
    job_id: JobId,
    unit_id: UnitId,
    task: JoinHandle<EngineResult<Unit>>,
}

impl UnitRetryHandle {
    /// Returns the owning job's identifier.
    #[must_use]
    pub const fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Returns the retried unit's identifier.
    #[must_use]
    pub const fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    /// Waits for the retry and returns the unit as stored afterwards.
    ///
    /// # Errors
    ///
    /// Returns the retry's error, or [`EngineError::Interrupted`] when the
    /// task panicked or was aborted.
    pub async fn wait(self) -> EngineResult<Unit> {
        self.task
            .await
            .map_err(|err| EngineError::Interrupted(err.to_string()))?
    }
}
