//! Webhook resolution tests: revision counting, deduplication and merge
//! tracking, ending in engine submission.

use crate::in_memory::helpers::{Harness, PR_URL, REPO_URL, agent, findings, provider_name};
use mockable::DefaultClock;
use revue::job::{
    adapters::memory::InMemoryJobStore,
    domain::{Job, JobStatus},
    ports::JobStore,
    services::{EngineConfig, PipelinePolicy},
};
use revue::provider::{
    adapters::memory::InMemoryProvider,
    domain::{PullRequestAction, PullRequestEvent, WebhookDelivery, WebhookEvent},
    ports::ProviderError,
};
use revue::webhook::{
    domain::{ReviewableActions, WebhookOutcome},
    services::{WebhookError, WebhookResolver},
};
use rstest::{fixture, rstest};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

type Resolver = WebhookResolver<InMemoryJobStore, DefaultClock>;

#[fixture]
fn store() -> InMemoryJobStore {
    InMemoryJobStore::new()
}

fn resolver(store: &InMemoryJobStore) -> Resolver {
    WebhookResolver::new(
        Arc::new(store.clone()),
        Arc::new(DefaultClock),
        ReviewableActions::default(),
    )
}

fn event(action: PullRequestAction, sha: &str) -> WebhookEvent {
    event_on(PR_URL, action, sha)
}

fn event_on(pr_url: &str, action: PullRequestAction, sha: &str) -> WebhookEvent {
    WebhookEvent::PullRequest(PullRequestEvent {
        provider: provider_name(),
        action,
        repository_url: REPO_URL.to_owned(),
        pr_url: pr_url.to_owned(),
        pr_number: 42,
        source_branch: "feature".to_owned(),
        commit_sha: sha.to_owned(),
        occurred_at: None,
    })
}

fn revision(job: &Job) -> u32 {
    job.review().expect("review job").revision_count()
}

#[rstest]
#[tokio::test]
async fn each_new_commit_gets_the_next_revision(store: InMemoryJobStore) {
    let resolver = resolver(&store);
    let mut revisions = Vec::new();

    for (action, sha) in [
        (PullRequestAction::Opened, "sha-1"),
        (PullRequestAction::Synchronize, "sha-2"),
        (PullRequestAction::Synchronize, "sha-3"),
    ] {
        let outcome = resolver.resolve(&event(action, sha)).await.expect("resolves");
        let job = outcome.created_job().expect("review created");
        revisions.push(revision(job));
    }
    let repeat = resolver
        .resolve(&event(PullRequestAction::Synchronize, "sha-2"))
        .await
        .expect("resolves");

    assert_eq!(revisions, vec![1, 2, 3]);
    let WebhookOutcome::Existing(existing) = repeat else {
        panic!("expected the existing review, got {repeat:?}");
    };
    assert_eq!(revision(&existing), 2);
    assert_eq!(
        store.max_revision_by_pr_url(PR_URL).await.expect("lookup"),
        Some(3)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deliveries_create_one_review(store: InMemoryJobStore) {
    let resolver = resolver(&store);

    let deliveries: Vec<_> = (0..8)
        .map(|_| {
            let worker = resolver.clone();
            tokio::spawn(async move {
                worker
                    .resolve(&event(PullRequestAction::Opened, "sha-1"))
                    .await
            })
        })
        .collect();
    let mut created = 0;
    let mut ids = HashSet::new();
    for delivery in deliveries {
        let outcome = delivery
            .await
            .expect("delivery task joins")
            .expect("resolves");
        if matches!(outcome, WebhookOutcome::Created(_)) {
            created += 1;
        }
        ids.insert(outcome.job_id().expect("review id"));
    }

    assert_eq!(created, 1);
    assert_eq!(ids.len(), 1);
}

#[rstest]
#[tokio::test]
async fn merge_and_close_stamp_every_revision(store: InMemoryJobStore) {
    let resolver = resolver(&store);
    for sha in ["sha-1", "sha-2"] {
        resolver
            .resolve(&event(PullRequestAction::Synchronize, sha))
            .await
            .expect("resolves");
    }

    let merged = resolver
        .resolve(&event(PullRequestAction::Merged, "sha-2"))
        .await
        .expect("resolves");
    let closed_elsewhere = resolver
        .resolve(&event_on(
            &format!("{REPO_URL}/pull/99"),
            PullRequestAction::Closed,
            "sha-9",
        ))
        .await
        .expect("resolves");

    assert!(matches!(merged, WebhookOutcome::MergedAtUpdated { updated: 2, .. }));
    assert!(matches!(
        closed_elsewhere,
        WebhookOutcome::MergedAtUpdated { updated: 0, .. }
    ));
    let reviews = store
        .list_jobs_by_status(JobStatus::Pending)
        .await
        .expect("listing succeeds");
    assert_eq!(reviews.len(), 2);
    assert!(reviews.iter().all(|job| job.merged_at().is_some()));
}

#[rstest]
#[case(PullRequestAction::Edited)]
#[case(PullRequestAction::ReadyForReview)]
#[case(PullRequestAction::Other("labeled".to_owned()))]
#[tokio::test]
async fn non_reviewable_actions_are_ignored(
    store: InMemoryJobStore,
    #[case] action: PullRequestAction,
) {
    let outcome = resolver(&store)
        .resolve(&event(action, "sha-1"))
        .await
        .expect("resolves");

    assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));
    assert!(
        store
            .list_jobs_by_status(JobStatus::Pending)
            .await
            .expect("listing succeeds")
            .is_empty()
    );
}

#[rstest]
#[tokio::test]
async fn deliveries_with_a_bad_token_are_rejected(store: InMemoryJobStore) {
    let client = InMemoryProvider::new(provider_name());
    let delivery = WebhookDelivery {
        event_type: "pull_request".to_owned(),
        token: Some("guess".to_owned()),
        body: json!({
            "action": "opened",
            "repository_url": REPO_URL,
            "pull_request": {"url": PR_URL, "number": 42, "source_branch": "feature", "head_sha": "sha-1"}
        })
        .to_string()
        .into_bytes(),
    };

    let result = resolver(&store)
        .resolve_delivery(&client, &delivery, Some("s3cret"))
        .await;

    assert!(matches!(
        result,
        Err(WebhookError::Provider(ProviderError::InvalidSignature))
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn webhook_review_runs_and_comments_on_the_pull_request() {
    let scripted = agent().with_output("security", findings("critical", "hard-coded key"));
    let harness = Harness::started(
        scripted,
        &["naming", "security"],
        EngineConfig::default()
            .with_pipeline(PipelinePolicy::default().with_review_comments(true)),
    );
    let resolver = resolver(&harness.store);
    let delivery = WebhookDelivery {
        event_type: "pull_request".to_owned(),
        token: Some("s3cret".to_owned()),
        body: json!({
            "action": "opened",
            "repository_url": REPO_URL,
            "pull_request": {"url": PR_URL, "number": 42, "source_branch": "feature", "head_sha": "sha-1"}
        })
        .to_string()
        .into_bytes(),
    };

    let outcome = resolver
        .resolve_delivery(&harness.provider, &delivery, Some("s3cret"))
        .await
        .expect("resolves");
    let job = outcome.created_job().expect("review created");
    let finished = harness
        .engine
        .submit(job)
        .await
        .expect("submit succeeds")
        .wait()
        .await
        .expect("job finishes");

    assert_eq!(finished.status(), JobStatus::Completed);
    let comments = harness.provider.comments();
    assert_eq!(comments.len(), 1);
    let comment = comments.first().expect("comment posted");
    assert_eq!(comment.pr_url, PR_URL);
    assert!(comment.body.contains("**critical** [correctness] hard-coded key"));
    let requests = harness.agent.calls();
    assert!(requests.iter().all(|request| request.content.contains("src/charge.rs")));
    harness.engine.shutdown().await;
}
