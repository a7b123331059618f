//! Job persistence tests against `PostgreSQL`.

use super::helpers::{PR_URL, PostgresFixture, postgres, pull_request_review, review_job};
use chrono::Utc;
use revue::job::{
    domain::{DedupKey, JobStatus, ReviewDetails},
    ports::{JobStore, JobStoreError},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn review_round_trips_through_storage(postgres: Option<PostgresFixture>) {
    let Some(fixture) = postgres else {
        return;
    };
    let store = &fixture.store;
    let job = pull_request_review("c0ffee", 2);

    store.create_job(&job).await.expect("job stored");
    let duplicate = store.create_job(&job).await;
    let found = store
        .find_job(job.id())
        .await
        .expect("lookup succeeds")
        .expect("job exists");

    assert!(matches!(duplicate, Err(JobStoreError::DuplicateJob(id)) if id == job.id()));
    assert_eq!(found.status(), JobStatus::Pending);
    assert_eq!(found.pr_url(), Some(PR_URL));
    assert_eq!(found.dedup_key(), job.dedup_key());
    assert_eq!(
        found.review().map(ReviewDetails::revision_count),
        Some(2)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn conditional_update_reports_affected_rows(postgres: Option<PostgresFixture>) {
    let Some(fixture) = postgres else {
        return;
    };
    let store = &fixture.store;
    let job = review_job();
    store.create_job(&job).await.expect("job stored");
    let now = Utc::now();

    let rejected = store
        .update_status_if_allowed(job.id(), JobStatus::Running, &[JobStatus::Failed], now, None)
        .await
        .expect("update runs");
    let accepted = store
        .update_status_if_allowed(job.id(), JobStatus::Running, &[JobStatus::Pending], now, None)
        .await
        .expect("update runs");
    let failed = store
        .update_status_if_allowed(
            job.id(),
            JobStatus::Failed,
            &[JobStatus::Running],
            now,
            Some("agent crashed".to_owned()),
        )
        .await
        .expect("update runs");

    let reset = store
        .update_status_if_allowed(job.id(), JobStatus::Pending, &[JobStatus::Failed], now, None)
        .await
        .expect("update runs");

    assert_eq!((rejected, accepted, failed, reset), (0, 1, 1, 1));
    let stored = store
        .find_job(job.id())
        .await
        .expect("lookup succeeds")
        .expect("job exists");
    assert_eq!(stored.status(), JobStatus::Pending);
    assert_eq!(stored.retry_count(), 1);
    assert_eq!(stored.error_message(), None);
    assert!(stored.started_at().is_none());
    assert!(stored.completed_at().is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_succeed_exactly_once(postgres: Option<PostgresFixture>) {
    let Some(fixture) = postgres else {
        return;
    };
    let job = review_job();
    fixture.store.create_job(&job).await.expect("job stored");

    let claims: Vec<_> = (0..8)
        .map(|_| {
            let claimer = fixture.store.clone();
            let id = job.id();
            tokio::spawn(async move {
                claimer
                    .update_status_if_allowed(
                        id,
                        JobStatus::Running,
                        &[JobStatus::Pending],
                        Utc::now(),
                        None,
                    )
                    .await
                    .expect("update runs")
            })
        })
        .collect();
    let mut total = 0;
    for claim in claims {
        total += claim.await.expect("claim task joins");
    }

    assert_eq!(total, 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dedup_key_is_unique_per_pull_request_commit(postgres: Option<PostgresFixture>) {
    let Some(fixture) = postgres else {
        return;
    };
    let store = &fixture.store;
    let first = pull_request_review("abc123", 1);
    store.create_job(&first).await.expect("first review stored");

    let result = store.create_job(&pull_request_review("abc123", 2)).await;
    let key = DedupKey::new(PR_URL, "abc123").expect("valid key");
    let found = store
        .find_by_dedup_key(&key)
        .await
        .expect("lookup succeeds")
        .expect("review exists");

    assert!(matches!(result, Err(JobStoreError::DuplicateDedupKey(conflict)) if conflict == key));
    assert_eq!(found.id(), first.id());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn max_revision_and_merge_cover_every_review(postgres: Option<PostgresFixture>) {
    let Some(fixture) = postgres else {
        return;
    };
    let store = &fixture.store;
    for (sha, revision) in [("aaa", 1), ("bbb", 3), ("ccc", 2)] {
        store
            .create_job(&pull_request_review(sha, revision))
            .await
            .expect("review stored");
    }
    store.create_job(&review_job()).await.expect("job stored");

    let max = store
        .max_revision_by_pr_url(PR_URL)
        .await
        .expect("lookup succeeds");
    let merged = store
        .update_merged_at_by_pr_url(PR_URL, Utc::now())
        .await
        .expect("merge recorded");

    assert_eq!(max, Some(3));
    assert_eq!(merged, 3);
    let pending = store
        .list_jobs_by_status(JobStatus::Pending)
        .await
        .expect("listing succeeds");
    let stamped = pending
        .iter()
        .filter(|job| job.merged_at().is_some())
        .count();
    assert_eq!((pending.len(), stamped), (4, 3));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn pending_jobs_are_listed_oldest_first(postgres: Option<PostgresFixture>) {
    let Some(fixture) = postgres else {
        return;
    };
    let store = &fixture.store;
    let older = review_job();
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    let newer = review_job();
    store.create_job(&newer).await.expect("job stored");
    store.create_job(&older).await.expect("job stored");

    let listed = store
        .list_jobs_by_status(JobStatus::Pending)
        .await
        .expect("listing succeeds");

    let ids: Vec<_> = listed.iter().map(|job| job.id()).collect();
    assert_eq!(ids, vec![older.id(), newer.id()]);
}
