//! No-op notifier.

use crate::notification::{
    domain::JobNotification,
    ports::{Notifier, NotifyError},
};
use async_trait::async_trait;

/// Notifier that discards every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn notify(&self, _notification: &JobNotification) -> Result<(), NotifyError> {
        Ok(())
    }
}
