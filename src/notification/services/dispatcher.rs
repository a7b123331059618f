//! Fan-out of terminal job notifications to configured notifiers.

use crate::notification::{domain::JobNotification, ports::Notifier};
use std::sync::{Arc, PoisonError, RwLock};

/// Explicitly constructed notification dispatcher.
///
/// Clones share the same notifier list, so a host can reconfigure the
/// dispatcher it already handed to the engine.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    notifiers: Arc<RwLock<Vec<Arc<dyn Notifier>>>>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher with no notifiers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the notifier list.
    pub fn configure(&self, notifiers: Vec<Arc<dyn Notifier>>) {
        *self
            .notifiers
            .write()
            .unwrap_or_else(PoisonError::into_inner) = notifiers;
    }

    /// Adds one notifier.
    pub fn add(&self, notifier: Arc<dyn Notifier>) {
        self.notifiers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notifier);
    }

    /// Removes every notifier.
    pub fn reset(&self) {
        self.configure(Vec::new());
    }

    /// Returns how many notifiers are configured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when no notifier is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `notification` to every notifier.
    ///
    /// Failures are logged and never propagated.
    pub async fn dispatch(&self, notification: &JobNotification) {
        let notifiers = self
            .notifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for notifier in notifiers {
            if let Err(err) = notifier.notify(notification).await {
                tracing::warn!(
                    job_id = %notification.job_id,
                    status = %notification.status,
                    error = %err,
                    "notification delivery failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("notifiers", &self.len())
            .finish()
    }
}
