//! Notifier port.

use crate::notification::domain::JobNotification;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from notification delivery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifyError {
    /// The notification could not be delivered.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Delivers terminal job notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `notification`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::SendFailed`] when delivery fails.
    async fn notify(&self, notification: &JobNotification) -> Result<(), NotifyError>;
}
