//! Shared harness for in-memory engine and webhook integration tests.

use mockable::DefaultClock;
use revue::agent::{
    adapters::memory::ScriptedAgentClient, domain::AgentName, services::AgentRegistry,
};
use revue::job::{
    adapters::memory::{InMemoryJobStore, StaticUnitCatalog},
    domain::{
        Job, JobDetails, JobId, JobStatus, PullRequestInfo, RepositoryTarget, ReviewDetails,
        TriggerSource, UnitDefinition, UnitStatus,
    },
    ports::JobStore,
    services::{Collaborators, EngineConfig, JobEngine},
};
use revue::notification::{adapters::RecordingNotifier, services::NotificationDispatcher};
use revue::provider::{
    adapters::memory::InMemoryProvider,
    domain::{ProviderName, SourceFile},
    services::ProviderRegistry,
};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};

/// Repository every fixture job targets.
pub const REPO_URL: &str = "https://git.example/acme/payments";
/// Head commit of the fixture repository.
pub const HEAD_SHA: &str = "9b1d2e7";
/// Pull request used by webhook scenarios.
pub const PR_URL: &str = "https://git.example/acme/payments/pull/42";

/// Engine type used by the integration tests.
pub type TestEngine = JobEngine<InMemoryJobStore, DefaultClock>;

/// Name under which the scripted agent is registered.
#[must_use]
pub fn agent_name() -> AgentName {
    AgentName::new("reviewer").expect("valid agent name")
}

/// Name under which the in-memory provider is registered.
#[must_use]
pub fn provider_name() -> ProviderName {
    ProviderName::new("memory").expect("valid provider name")
}

/// Renders one finding as agent output.
#[must_use]
pub fn findings(severity: &str, description: &str) -> String {
    json!({
        "findings": [
            {"severity": severity, "category": "correctness", "description": description}
        ]
    })
    .to_string()
}

/// Agent answering every unit with an informational finding.
#[must_use]
pub fn agent() -> ScriptedAgentClient {
    ScriptedAgentClient::new(agent_name(), findings("info", "looks fine"))
}

/// Review rules run by the scripted agent, in order.
#[must_use]
pub fn rules(names: &[&str]) -> Vec<UnitDefinition> {
    names
        .iter()
        .map(|name| {
            UnitDefinition::new(*name, agent_name(), "Check {{ unit }} in {{ repository.url }}")
                .expect("valid unit definition")
        })
        .collect()
}

/// Provider serving the fixture repository.
#[must_use]
pub fn provider() -> InMemoryProvider {
    let file = SourceFile::new("src/charge.rs", "pub fn charge(amount: u64) -> u64 { amount }")
        .expect("valid source file");
    InMemoryProvider::new(provider_name()).with_repository(REPO_URL, HEAD_SHA, vec![file])
}

/// Review of the fixture repository's default branch.
#[must_use]
pub fn review_job() -> Job {
    let repository =
        RepositoryTarget::new(provider_name(), REPO_URL, "main").expect("valid repository");
    Job::new(
        repository,
        TriggerSource::Api,
        JobDetails::Review(ReviewDetails::for_ref(None)),
        &DefaultClock,
    )
}

/// Pull request review pinned to `commit_sha`.
#[must_use]
pub fn pull_request_review(commit_sha: &str, revision: u32) -> Job {
    let repository =
        RepositoryTarget::new(provider_name(), REPO_URL, "feature").expect("valid repository");
    let pull_request = PullRequestInfo::new(PR_URL, 42).expect("valid pull request");
    let details = ReviewDetails::for_pull_request(pull_request, commit_sha, revision)
        .expect("valid review details");
    Job::new(
        repository,
        TriggerSource::PullRequest,
        JobDetails::Review(details),
        &DefaultClock,
    )
}

/// Terminal callbacks observed by a harness.
#[derive(Clone, Default)]
pub struct CallbackLog {
    completed: Arc<Mutex<Vec<JobId>>>,
    errored: Arc<Mutex<Vec<(JobId, JobStatus)>>>,
}

impl CallbackLog {
    /// Jobs passed to `on_complete`, in call order.
    #[must_use]
    pub fn completed(&self) -> Vec<JobId> {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Jobs and statuses passed to `on_error`, in call order.
    #[must_use]
    pub fn errored(&self) -> Vec<(JobId, JobStatus)> {
        self.errored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Engine wired to in-memory collaborators.
pub struct Harness {
    /// Shared job store.
    pub store: InMemoryJobStore,
    /// Scripted agent executing every unit.
    pub agent: ScriptedAgentClient,
    /// Provider serving repository content and recording comments.
    pub provider: InMemoryProvider,
    /// Notifier recording terminal notifications.
    pub notifications: RecordingNotifier,
    /// Terminal callback log.
    pub callbacks: CallbackLog,
    /// Engine under test.
    pub engine: TestEngine,
}

impl Harness {
    /// Builds an engine without starting its workers.
    #[must_use]
    pub fn idle(agent: ScriptedAgentClient, rule_names: &[&str], config: EngineConfig) -> Self {
        let store = InMemoryJobStore::new();
        let provider = provider();
        let agents = AgentRegistry::new();
        agents
            .register(agent_name(), Arc::new(agent.clone()))
            .expect("agent registration");
        let providers = ProviderRegistry::new();
        providers
            .register(provider_name(), Arc::new(provider.clone()))
            .expect("provider registration");
        let notifications = RecordingNotifier::new();
        let dispatcher = NotificationDispatcher::new();
        dispatcher.add(Arc::new(notifications.clone()));

        let engine = JobEngine::new(
            Arc::new(store.clone()),
            Arc::new(DefaultClock),
            Collaborators {
                catalog: Arc::new(StaticUnitCatalog::new(rules(rule_names), Vec::new())),
                agents,
                providers,
            },
            dispatcher,
            config,
        )
        .expect("valid engine config");

        let callbacks = CallbackLog::default();
        let completed = Arc::clone(&callbacks.completed);
        let errored = Arc::clone(&callbacks.errored);
        engine.set_callbacks(
            move |job| {
                completed
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(job.id());
            },
            move |job| {
                errored
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((job.id(), job.status()));
            },
        );

        Self {
            store,
            agent,
            provider,
            notifications,
            callbacks,
            engine,
        }
    }

    /// Builds an engine and starts its workers.
    #[must_use]
    pub fn started(agent: ScriptedAgentClient, rule_names: &[&str], config: EngineConfig) -> Self {
        let harness = Self::idle(agent, rule_names, config);
        harness.engine.start();
        harness
    }

    /// Stores `job` and returns it.
    pub async fn store_job(&self, job: Job) -> Job {
        self.store.create_job(&job).await.expect("job stored");
        job
    }

    /// Returns the job as currently stored.
    pub async fn job(&self, job_id: JobId) -> Job {
        self.store
            .find_job(job_id)
            .await
            .expect("lookup succeeds")
            .expect("job exists")
    }

    /// Returns the statuses of a job's units in ordinal order.
    pub async fn unit_statuses(&self, job_id: JobId) -> Vec<UnitStatus> {
        self.store
            .find_units(job_id)
            .await
            .expect("units load")
            .iter()
            .map(|unit| unit.status())
            .collect()
    }
}
