//! Normalised webhook events.

use super::ProviderName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw webhook delivery as received from a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookDelivery {
    /// Provider event type header (`push`, `pull_request`, `Merge Request Hook`).
    pub event_type: String,
    /// Shared-secret token or signature sent with the delivery.
    pub token: Option<String>,
    /// Raw request body.
    pub body: Vec<u8>,
}

/// Pull or merge request action, normalised across providers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PullRequestAction {
    /// The request was opened.
    Opened,
    /// New commits were pushed to the source branch.
    Synchronize,
    /// A closed request was reopened.
    Reopened,
    /// Title or description changed.
    Edited,
    /// A draft was marked ready for review.
    ReadyForReview,
    /// The request was closed without merging.
    Closed,
    /// The request was merged.
    Merged,
    /// Any other provider action, kept verbatim.
    Other(String),
}

impl PullRequestAction {
    /// Parses GitHub (`synchronize`) and GitLab (`update`) action names.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "opened" | "open" => Self::Opened,
            "synchronize" | "update" => Self::Synchronize,
            "reopened" | "reopen" => Self::Reopened,
            "edited" => Self::Edited,
            "ready_for_review" => Self::ReadyForReview,
            "closed" | "close" => Self::Closed,
            "merged" | "merge" => Self::Merged,
            _ => Self::Other(raw.trim().to_owned()),
        }
    }

    /// Returns the canonical action name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Opened => "opened",
            Self::Synchronize => "synchronize",
            Self::Reopened => "reopened",
            Self::Edited => "edited",
            Self::ReadyForReview => "ready_for_review",
            Self::Closed => "closed",
            Self::Merged => "merged",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Returns `true` for actions that end the request's life.
    #[must_use]
    pub const fn is_merge_or_close(&self) -> bool {
        matches!(self, Self::Closed | Self::Merged)
    }
}

impl From<String> for PullRequestAction {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<PullRequestAction> for String {
    fn from(value: PullRequestAction) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for PullRequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commits pushed to a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    /// Provider that sent the event.
    pub provider: ProviderName,
    /// Repository URL.
    pub repository_url: String,
    /// Branch or tag ref that moved.
    pub git_ref: String,
    /// Head commit after the push.
    pub commit_sha: String,
}

/// Pull or merge request activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    /// Provider that sent the event.
    pub provider: ProviderName,
    /// Normalised action.
    pub action: PullRequestAction,
    /// Repository URL.
    pub repository_url: String,
    /// Pull request URL.
    pub pr_url: String,
    /// Provider-assigned pull request number.
    pub pr_number: u64,
    /// Source branch of the request.
    pub source_branch: String,
    /// Head commit of the request.
    pub commit_sha: String,
    /// When the provider says the action happened.
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Inbound webhook event after parsing and signature validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Branch push.
    Push(PushEvent),
    /// Pull or merge request activity.
    PullRequest(PullRequestEvent),
}

impl WebhookEvent {
    /// Returns the provider that sent the event.
    #[must_use]
    pub const fn provider(&self) -> &ProviderName {
        match self {
            Self::Push(event) => &event.provider,
            Self::PullRequest(event) => &event.provider,
        }
    }
}
