//! Notifier that records deliveries in memory.

use crate::notification::{
    domain::JobNotification,
    ports::{Notifier, NotifyError},
};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};

/// Records every notification it receives.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<JobNotification>>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the notifications received so far.
    #[must_use]
    pub fn delivered(&self) -> Vec<JobNotification> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &JobNotification) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .map_err(|err| NotifyError::SendFailed(err.to_string()))?
            .push(notification.clone());
        Ok(())
    }
}
