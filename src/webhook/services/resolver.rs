//! Dedup and revision resolver for webhook-triggered reviews.

use crate::job::{
    domain::{
        DedupKey, Job, JobDetails, JobDomainError, PullRequestInfo, RepositoryTarget,
        ReviewDetails, TriggerSource,
    },
    ports::{JobStore, JobStoreError},
};
use crate::provider::{
    domain::{PullRequestAction, PullRequestEvent, PushEvent, WebhookDelivery, WebhookEvent},
    ports::{ProviderClient, ProviderError},
};
use crate::webhook::domain::{ReviewableActions, WebhookOutcome};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned while resolving webhook events.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The event carried invalid data.
    #[error(transparent)]
    Domain(#[from] JobDomainError),
    /// The delivery could not be parsed or authenticated.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// Result type for webhook resolution.
pub type WebhookResult<T> = Result<T, WebhookError>;

/// Decides review creation for inbound webhook events.
pub struct WebhookResolver<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    actions: ReviewableActions,
}

impl<S, C> Clone for WebhookResolver<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            actions: self.actions.clone(),
        }
    }
}

impl<S, C> WebhookResolver<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    /// Creates a resolver with the given reviewable-action allow-list.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>, actions: ReviewableActions) -> Self {
        Self {
            store,
            clock,
            actions,
        }
    }

    /// Returns the reviewable-action allow-list.
    #[must_use]
    pub const fn actions(&self) -> &ReviewableActions {
        &self.actions
    }

    /// Parses a raw delivery with `client` and resolves the resulting event.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Provider`] when the delivery is rejected, or
    /// any error [`Self::resolve`] returns.
    pub async fn resolve_delivery(
        &self,
        client: &dyn ProviderClient,
        delivery: &WebhookDelivery,
        secret: Option<&str>,
    ) -> WebhookResult<WebhookOutcome> {
        let event = client.parse_webhook(delivery, secret)?;
        self.resolve(&event).await
    }

    /// Resolves one event.
    ///
    /// Push events always create a review. Merge and close actions update
    /// the merge timestamp of every review of the pull request. Reviewable
    /// actions create a review unless one exists for the same pull request
    /// URL and commit.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Domain`] for invalid event data or
    /// [`WebhookError::Store`] when persistence fails.
    pub async fn resolve(&self, event: &WebhookEvent) -> WebhookResult<WebhookOutcome> {
        match event {
            WebhookEvent::Push(push) => self.resolve_push(push).await,
            WebhookEvent::PullRequest(pull_request) => {
                self.resolve_pull_request(pull_request).await
            }
        }
    }

    async fn resolve_push(&self, event: &PushEvent) -> WebhookResult<WebhookOutcome> {
        let target = RepositoryTarget::new(
            event.provider.clone(),
            event.repository_url.as_str(),
            event.git_ref.as_str(),
        )?;
        let details = ReviewDetails::for_ref(Some(event.commit_sha.clone()));
        let job = Job::new(
            target,
            TriggerSource::Push,
            JobDetails::Review(details),
            &*self.clock,
        );
        self.store.create_job(&job).await?;
        tracing::info!(
            job_id = %job.id(),
            repository = %event.repository_url,
            git_ref = %event.git_ref,
            "created review from push event"
        );
        Ok(WebhookOutcome::Created(job))
    }

    async fn resolve_pull_request(
        &self,
        event: &PullRequestEvent,
    ) -> WebhookResult<WebhookOutcome> {
        if event.action.is_merge_or_close() {
            let merged_at = event.occurred_at.unwrap_or_else(|| self.clock.utc());
            let updated = self
                .store
                .update_merged_at_by_pr_url(&event.pr_url, merged_at)
                .await?;
            tracing::info!(
                pr_url = %event.pr_url,
                action = %event.action,
                updated,
                "recorded pull request merge"
            );
            return Ok(WebhookOutcome::MergedAtUpdated {
                pr_url: event.pr_url.clone(),
                updated,
            });
        }

        if !self.actions.contains(&event.action) {
            tracing::debug!(
                pr_url = %event.pr_url,
                action = %event.action,
                "ignoring non-reviewable pull request action"
            );
            return Ok(WebhookOutcome::Ignored {
                reason: format!("action '{}' is not reviewable", event.action),
            });
        }

        let key = DedupKey::new(event.pr_url.as_str(), event.commit_sha.as_str())?;
        if let Some(existing) = self.store.find_by_dedup_key(&key).await? {
            tracing::debug!(job_id = %existing.id(), dedup_key = %key, "review already exists");
            return Ok(WebhookOutcome::Existing(existing));
        }

        let revision = self.next_revision(event).await?;
        let pull_request = PullRequestInfo::new(event.pr_url.as_str(), event.pr_number)?;
        let details =
            ReviewDetails::for_pull_request(pull_request, event.commit_sha.as_str(), revision)?;
        let target = RepositoryTarget::new(
            event.provider.clone(),
            event.repository_url.as_str(),
            event.source_branch.as_str(),
        )?;
        let job = Job::new(
            target,
            TriggerSource::PullRequest,
            JobDetails::Review(details),
            &*self.clock,
        );

        match self.store.create_job(&job).await {
            Ok(()) => {
                tracing::info!(
                    job_id = %job.id(),
                    dedup_key = %key,
                    revision,
                    "created review from pull request event"
                );
                Ok(WebhookOutcome::Created(job))
            }
            Err(JobStoreError::DuplicateDedupKey(conflict)) => {
                // A concurrent delivery won the insert.
                let existing = self
                    .store
                    .find_by_dedup_key(&conflict)
                    .await?
                    .ok_or_else(|| JobStoreError::DuplicateDedupKey(conflict.clone()))?;
                tracing::debug!(job_id = %existing.id(), dedup_key = %conflict, "review already exists");
                Ok(WebhookOutcome::Existing(existing))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn next_revision(&self, event: &PullRequestEvent) -> WebhookResult<u32> {
        if event.action == PullRequestAction::Opened {
            return Ok(1);
        }
        let latest = self.store.max_revision_by_pr_url(&event.pr_url).await?;
        Ok(latest.map_or(1, |revision| revision.saturating_add(1)))
    }
}
