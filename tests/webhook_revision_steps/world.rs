//! Shared world state for pull request revision BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use revue::job::{
    adapters::memory::InMemoryJobStore,
    domain::{Job, JobStatus},
    ports::JobStore,
};
use revue::webhook::{
    domain::{ReviewableActions, WebhookOutcome},
    services::{WebhookError, WebhookResolver},
};
use rstest::fixture;

/// Resolver type used by the BDD world.
pub type TestResolver = WebhookResolver<InMemoryJobStore, DefaultClock>;

/// Scenario world for pull request revision behaviour tests.
pub struct WebhookRevisionWorld {
    pub store: InMemoryJobStore,
    pub resolver: TestResolver,
    pub pr_url: Option<String>,
    pub head_sha: Option<String>,
    pub last_outcome: Option<Result<WebhookOutcome, WebhookError>>,
}

impl WebhookRevisionWorld {
    /// Creates a world with an empty job store.
    #[must_use]
    pub fn new() -> Self {
        let store = InMemoryJobStore::new();
        let resolver = WebhookResolver::new(
            Arc::new(store.clone()),
            Arc::new(DefaultClock),
            ReviewableActions::default(),
        );

        Self {
            store,
            resolver,
            pr_url: None,
            head_sha: None,
            last_outcome: None,
        }
    }

    /// Returns the reviews recorded for the scenario's pull request.
    pub fn reviews(&self) -> Result<Vec<Job>, eyre::Report> {
        let pr_url = self
            .pr_url
            .as_deref()
            .ok_or_else(|| eyre::eyre!("missing pull request in scenario world"))?;
        let pending = run_async(self.store.list_jobs_by_status(JobStatus::Pending))?;
        Ok(pending
            .into_iter()
            .filter(|job| job.pr_url() == Some(pr_url))
            .collect())
    }
}

impl Default for WebhookRevisionWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> WebhookRevisionWorld {
    WebhookRevisionWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
