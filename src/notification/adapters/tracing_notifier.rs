//! Notifier that writes notifications to the log.

use crate::notification::{
    domain::JobNotification,
    ports::{Notifier, NotifyError},
};
use async_trait::async_trait;

/// Emits each notification as an `info` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notification: &JobNotification) -> Result<(), NotifyError> {
        tracing::info!(
            job_id = %notification.job_id,
            kind = %notification.kind,
            status = %notification.status,
            title = %notification.title(),
            "{}",
            notification.message()
        );
        Ok(())
    }
}
