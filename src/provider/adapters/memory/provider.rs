//! In-memory provider serving fixture repositories and a canonical JSON
//! webhook format.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::job::domain::{PullRequestInfo, RepositoryTarget};
use crate::provider::{
    domain::{
        ProviderName, PullRequestAction, PullRequestEvent, PushEvent, RepositorySnapshot,
        SourceFile, WebhookDelivery, WebhookEvent,
    },
    ports::{ProviderClient, ProviderError, ProviderResult},
};

/// Comment recorded by [`InMemoryProvider::post_comment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedComment {
    /// Pull request URL.
    pub pr_url: String,
    /// Pull request number.
    pub pr_number: u64,
    /// Comment body.
    pub body: String,
}

#[derive(Debug, Clone)]
struct RepositoryFixture {
    head_sha: String,
    branches: Vec<String>,
    files: Vec<SourceFile>,
}

#[derive(Debug, Default)]
struct ProviderState {
    repositories: HashMap<String, RepositoryFixture>,
    comments: Vec<PostedComment>,
    fetch_count: usize,
    fail_fetches: bool,
    fail_comments: bool,
}

/// Provider client backed by in-memory fixtures.
#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    name: ProviderName,
    state: Arc<RwLock<ProviderState>>,
}

impl InMemoryProvider {
    /// Creates a provider with no repositories.
    #[must_use]
    pub fn new(name: ProviderName) -> Self {
        Self {
            name,
            state: Arc::new(RwLock::new(ProviderState::default())),
        }
    }

    /// Adds a repository whose default branch is `main`.
    #[must_use]
    pub fn with_repository(
        self,
        url: impl Into<String>,
        head_sha: impl Into<String>,
        files: Vec<SourceFile>,
    ) -> Self {
        if let Ok(mut state) = self.write() {
            state.repositories.insert(
                url.into(),
                RepositoryFixture {
                    head_sha: head_sha.into(),
                    branches: vec!["main".to_owned()],
                    files,
                },
            );
        }
        self
    }

    /// Makes every repository fetch fail.
    pub fn fail_fetches(&self, fail: bool) {
        if let Ok(mut state) = self.write() {
            state.fail_fetches = fail;
        }
    }

    /// Makes every comment post fail.
    pub fn fail_comments(&self, fail: bool) {
        if let Ok(mut state) = self.write() {
            state.fail_comments = fail;
        }
    }

    /// Returns the comments posted so far.
    #[must_use]
    pub fn comments(&self) -> Vec<PostedComment> {
        self.read()
            .map(|state| state.comments.clone())
            .unwrap_or_default()
    }

    /// Returns how many repository fetches were served.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.read().map(|state| state.fetch_count).unwrap_or_default()
    }

    fn read(&self) -> ProviderResult<RwLockReadGuard<'_, ProviderState>> {
        self.state
            .read()
            .map_err(|err| ProviderError::transport(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> ProviderResult<RwLockWriteGuard<'_, ProviderState>> {
        self.state
            .write()
            .map_err(|err| ProviderError::transport(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl ProviderClient for InMemoryProvider {
    async fn fetch_repository(
        &self,
        target: &RepositoryTarget,
        commit_sha: Option<&str>,
    ) -> ProviderResult<RepositorySnapshot> {
        let mut state = self.write()?;
        if state.fail_fetches {
            return Err(ProviderError::transport(std::io::Error::other(
                "repository fetch disabled",
            )));
        }
        state.fetch_count = state.fetch_count.saturating_add(1);
        let fixture = state
            .repositories
            .get(target.url())
            .ok_or_else(|| ProviderError::RepositoryNotFound(target.url().to_owned()))?;
        let resolved = commit_sha.map_or_else(|| fixture.head_sha.clone(), ToOwned::to_owned);
        Ok(RepositorySnapshot::new(Some(resolved), fixture.files.clone()))
    }

    async fn list_branches(&self, repository_url: &str) -> ProviderResult<Vec<String>> {
        let state = self.read()?;
        state
            .repositories
            .get(repository_url)
            .map(|fixture| fixture.branches.clone())
            .ok_or_else(|| ProviderError::RepositoryNotFound(repository_url.to_owned()))
    }

    fn parse_webhook(
        &self,
        delivery: &WebhookDelivery,
        secret: Option<&str>,
    ) -> ProviderResult<WebhookEvent> {
        if let Some(expected) = secret {
            let provided = delivery.token.as_deref().unwrap_or_default();
            if !tokens_match(expected, provided) {
                return Err(ProviderError::InvalidSignature);
            }
        }

        match delivery.event_type.trim() {
            "push" | "Push Hook" => {
                let payload: PushPayload = decode(&delivery.body)?;
                Ok(WebhookEvent::Push(PushEvent {
                    provider: self.name.clone(),
                    repository_url: payload.repository_url,
                    git_ref: payload.git_ref,
                    commit_sha: payload.commit_sha,
                }))
            }
            "pull_request" | "merge_request" | "Merge Request Hook" => {
                let payload: PullRequestPayload = decode(&delivery.body)?;
                let parsed = PullRequestAction::parse(&payload.action);
                let action = if parsed == PullRequestAction::Closed && payload.pull_request.merged
                {
                    PullRequestAction::Merged
                } else {
                    parsed
                };
                Ok(WebhookEvent::PullRequest(PullRequestEvent {
                    provider: self.name.clone(),
                    action,
                    repository_url: payload.repository_url,
                    pr_url: payload.pull_request.url,
                    pr_number: payload.pull_request.number,
                    source_branch: payload.pull_request.source_branch,
                    commit_sha: payload.pull_request.head_sha,
                    occurred_at: payload.occurred_at,
                }))
            }
            other => Err(ProviderError::UnsupportedEvent(other.to_owned())),
        }
    }

    async fn post_comment(&self, pull_request: &PullRequestInfo, body: &str) -> ProviderResult<()> {
        let mut state = self.write()?;
        if state.fail_comments {
            return Err(ProviderError::transport(std::io::Error::other(
                "comment posting disabled",
            )));
        }
        state.comments.push(PostedComment {
            pr_url: pull_request.url().to_owned(),
            pr_number: pull_request.number(),
            body: body.to_owned(),
        });
        Ok(())
    }
}

#[derive(Deserialize)]
struct PushPayload {
    repository_url: String,
    #[serde(rename = "ref")]
    git_ref: String,
    commit_sha: String,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    action: String,
    repository_url: String,
    pull_request: PullRequestBody,
    #[serde(default)]
    occurred_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct PullRequestBody {
    url: String,
    number: u64,
    source_branch: String,
    head_sha: String,
    #[serde(default)]
    merged: bool,
}

fn decode<T: for<'de> Deserialize<'de>>(body: &[u8]) -> ProviderResult<T> {
    serde_json::from_slice(body).map_err(|err| ProviderError::MalformedPayload(err.to_string()))
}

/// Compares tokens without short-circuiting on the first differing byte.
fn tokens_match(expected: &str, provided: &str) -> bool {
    expected.len() == provided.len()
        && expected
            .bytes()
            .zip(provided.bytes())
            .fold(0_u8, |acc, (left, right)| acc | (left ^ right))
            == 0
}
