//! Provider client port.

use crate::job::domain::{PullRequestInfo, RepositoryTarget};
use crate::provider::domain::{RepositorySnapshot, WebhookDelivery, WebhookEvent};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Git hosting provider contract.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Fetches repository content for `target`, pinned to `commit_sha` when
    /// given.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::RepositoryNotFound`] for unknown
    /// repositories or refs, or [`ProviderError::Transport`] on I/O failure.
    async fn fetch_repository(
        &self,
        target: &RepositoryTarget,
        commit_sha: Option<&str>,
    ) -> ProviderResult<RepositorySnapshot>;

    /// Lists branch names of a repository.
    async fn list_branches(&self, repository_url: &str) -> ProviderResult<Vec<String>>;

    /// Validates and parses a webhook delivery.
    ///
    /// When `secret` is set the delivery token must match it.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidSignature`],
    /// [`ProviderError::UnsupportedEvent`] or
    /// [`ProviderError::MalformedPayload`].
    fn parse_webhook(
        &self,
        delivery: &WebhookDelivery,
        secret: Option<&str>,
    ) -> ProviderResult<WebhookEvent>;

    /// Posts a comment on a pull or merge request.
    async fn post_comment(&self, pull_request: &PullRequestInfo, body: &str) -> ProviderResult<()>;
}

/// Errors returned by provider clients.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The repository or ref does not exist.
    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    /// The webhook token did not match the shared secret.
    #[error("webhook signature is invalid")]
    InvalidSignature,

    /// The webhook event type is not handled.
    #[error("unsupported webhook event: {0}")]
    UnsupportedEvent(String),

    /// The webhook body could not be parsed.
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// Network or API failure.
    #[error("provider transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
