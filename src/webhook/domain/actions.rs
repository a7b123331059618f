//! Allow-list of pull request actions that trigger a review.

use crate::provider::domain::PullRequestAction;
use serde::{Deserialize, Serialize};

/// Pull request actions eligible for review.
///
/// Defaults to `opened`, `synchronize` and `reopened`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewableActions(Vec<PullRequestAction>);

impl ReviewableActions {
    /// Creates an allow-list from `actions`, dropping duplicates.
    #[must_use]
    pub fn new(actions: impl IntoIterator<Item = PullRequestAction>) -> Self {
        let mut unique = Vec::new();
        for action in actions {
            if !unique.contains(&action) {
                unique.push(action);
            }
        }
        Self(unique)
    }

    /// Returns `true` when `action` should trigger a review.
    #[must_use]
    pub fn contains(&self, action: &PullRequestAction) -> bool {
        self.0.contains(action)
    }

    /// Returns the allowed actions.
    #[must_use]
    pub fn actions(&self) -> &[PullRequestAction] {
        &self.0
    }
}

impl Default for ReviewableActions {
    fn default() -> Self {
        Self(vec![
            PullRequestAction::Opened,
            PullRequestAction::Synchronize,
            PullRequestAction::Reopened,
        ])
    }
}
