//! Bounded FIFO job queue shared by the worker pool.

use super::config::SubmitMode;
use crate::job::domain::JobId;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use thiserror::Error;

/// Why a job could not be enqueued.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub(crate) enum QueueError {
    /// The queue is at capacity.
    #[error("queue is full")]
    Full,
    /// The queue was closed by shutdown.
    #[error("queue is closed")]
    Closed,
    /// Blocking submission ran out of time.
    #[error("timed out after {0:?} waiting for queue capacity")]
    TimedOut(Duration),
}

/// Result of a successful enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enqueued {
    /// The job was added to the queue.
    Added,
    /// The job was already waiting in the queue.
    AlreadyQueued,
}

/// FIFO queue of job identifiers.
///
/// An identifier is held in the queue at most once at a time. Workers share
/// the receiving half and each take the next identifier in turn.
#[derive(Debug)]
pub(crate) struct JobQueue {
    sender: RwLock<Option<mpsc::Sender<JobId>>>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<JobId>>,
    queued: Mutex<HashSet<JobId>>,
}

impl JobQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender: RwLock::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            queued: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) async fn enqueue(&self, job_id: JobId, mode: SubmitMode) -> Result<Enqueued, QueueError> {
        let sender = self
            .sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(QueueError::Closed)?;

        if !self.lock_queued().insert(job_id) {
            return Ok(Enqueued::AlreadyQueued);
        }

        let sent = match mode {
            SubmitMode::FailFast => sender.try_send(job_id).map_err(|err| match err {
                TrySendError::Full(_) => QueueError::Full,
                TrySendError::Closed(_) => QueueError::Closed,
            }),
            SubmitMode::Block => sender.send(job_id).await.map_err(|_| QueueError::Closed),
            SubmitMode::BlockFor(limit) => {
                match tokio::time::timeout(limit, sender.send(job_id)).await {
                    Ok(result) => result.map_err(|_| QueueError::Closed),
                    Err(_) => Err(QueueError::TimedOut(limit)),
                }
            }
        };

        if let Err(err) = sent {
            self.lock_queued().remove(&job_id);
            return Err(err);
        }
        Ok(Enqueued::Added)
    }

    /// Waits for the next job; `None` once the queue is closed and drained.
    pub(crate) async fn dequeue(&self) -> Option<JobId> {
        let job_id = self.receiver.lock().await.recv().await?;
        self.lock_queued().remove(&job_id);
        Some(job_id)
    }

    /// Stops accepting jobs. Queued identifiers remain available to
    /// `dequeue`.
    pub(crate) fn close(&self) {
        self.sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn lock_queued(&self) -> std::sync::MutexGuard<'_, HashSet<JobId>> {
        self.queued.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
