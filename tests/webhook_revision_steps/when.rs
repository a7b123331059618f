//! When steps for pull request revision BDD scenarios.

use super::world::{WebhookRevisionWorld, run_async};
use revue::provider::domain::{ProviderName, PullRequestAction, PullRequestEvent, WebhookEvent};
use rstest_bdd_macros::when;

fn deliver(
    world: &mut WebhookRevisionWorld,
    action: PullRequestAction,
    commit_sha: String,
) -> Result<(), eyre::Report> {
    let pr_url = world
        .pr_url
        .clone()
        .ok_or_else(|| eyre::eyre!("missing pull request in scenario world"))?;
    let event = WebhookEvent::PullRequest(PullRequestEvent {
        provider: ProviderName::new("memory")?,
        action,
        repository_url: "https://git.example/acme/payments".to_owned(),
        pr_url,
        pr_number: 7,
        source_branch: "feature".to_owned(),
        commit_sha: commit_sha.clone(),
        occurred_at: None,
    });

    world.last_outcome = Some(run_async(world.resolver.resolve(&event)));
    world.head_sha = Some(commit_sha);
    Ok(())
}

#[when(r#"the pull request is opened at commit "{commit_sha}""#)]
fn pull_request_opened(
    world: &mut WebhookRevisionWorld,
    commit_sha: String,
) -> Result<(), eyre::Report> {
    deliver(world, PullRequestAction::Opened, commit_sha)
}

#[when(r#"the pull request is synchronized to commit "{commit_sha}""#)]
fn pull_request_synchronized(
    world: &mut WebhookRevisionWorld,
    commit_sha: String,
) -> Result<(), eyre::Report> {
    deliver(world, PullRequestAction::Synchronize, commit_sha)
}

#[when(r#"the pull request is edited at commit "{commit_sha}""#)]
fn pull_request_edited(
    world: &mut WebhookRevisionWorld,
    commit_sha: String,
) -> Result<(), eyre::Report> {
    deliver(world, PullRequestAction::Edited, commit_sha)
}

#[when("the pull request is merged")]
fn pull_request_merged(world: &mut WebhookRevisionWorld) -> Result<(), eyre::Report> {
    let head_sha = world
        .head_sha
        .clone()
        .ok_or_else(|| eyre::eyre!("missing head commit in scenario world"))?;
    deliver(world, PullRequestAction::Merged, head_sha)
}
