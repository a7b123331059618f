//! Job engine lifecycle tests: submission, claiming, cancellation, retry
//! and the timeout reaper.

use crate::in_memory::helpers::{Harness, agent, findings, review_job};
use revue::job::{
    domain::{JobId, JobStatus, UnitStatus},
    ports::JobStore,
    services::{EngineConfig, EngineError, PipelinePolicy, SubmitMode},
};
use chrono::Utc;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

async fn fail_job(harness: &Harness, job_id: JobId) {
    for (target, allowed) in [
        (JobStatus::Running, JobStatus::Pending),
        (JobStatus::Failed, JobStatus::Running),
    ] {
        let rows = harness
            .store
            .update_status_if_allowed(
                job_id,
                target,
                &[allowed],
                Utc::now(),
                Some("agent unavailable".to_owned()),
            )
            .await
            .expect("transition runs");
        assert_eq!(rows, 1);
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn submitted_job_runs_every_unit_and_completes() {
    let harness = Harness::started(agent(), &["naming", "errors", "tests"], EngineConfig::default());
    let job = harness.store_job(review_job()).await;

    let handle = harness.engine.submit(&job).await.expect("submit succeeds");
    let finished = handle.wait().await.expect("job finishes");

    assert_eq!(finished.status(), JobStatus::Completed);
    assert!(finished.completed_at().is_some());
    let progress = handle.progress().await.expect("progress");
    assert_eq!((progress.current_unit, progress.total_units), (3, 3));
    assert_eq!(harness.callbacks.completed(), vec![job.id()]);
    assert!(harness.callbacks.errored().is_empty());
    assert_eq!(harness.agent.called_units(), vec!["naming", "errors", "tests"]);
    assert_eq!(harness.notifications.delivered().len(), 1);
    harness.engine.shutdown().await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn job_without_configured_units_fails() {
    let harness = Harness::started(agent(), &[], EngineConfig::default());
    let job = harness.store_job(review_job()).await;

    let finished = harness
        .engine
        .submit(&job)
        .await
        .expect("submit succeeds")
        .wait()
        .await
        .expect("job finishes");

    assert_eq!(finished.status(), JobStatus::Failed);
    assert_eq!(
        finished.error_message(),
        Some("no units configured for review jobs")
    );
    assert!(harness.agent.calls().is_empty());
    assert_eq!(harness.callbacks.errored(), vec![(job.id(), JobStatus::Failed)]);
    harness.engine.shutdown().await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_run_the_job_once() {
    let harness = Harness::started(
        agent(),
        &["naming", "errors"],
        EngineConfig::default().with_workers(4),
    );
    let job = harness.store_job(review_job()).await;

    let submissions: Vec<_> = (0..10)
        .map(|_| {
            let engine = harness.engine.clone();
            let submitted = job.clone();
            tokio::spawn(async move { engine.submit(&submitted).await })
        })
        .collect();
    let mut handles = Vec::new();
    for submission in submissions {
        match submission.await.expect("submit task joins") {
            Ok(handle) => handles.push(handle),
            Err(EngineError::InvalidState { .. }) => {}
            Err(other) => panic!("unexpected submit error: {other}"),
        }
    }
    let handle = handles.first().expect("at least one submission accepted");
    let finished = handle.wait().await.expect("job finishes");
    harness.engine.shutdown().await;

    assert_eq!(finished.status(), JobStatus::Completed);
    assert_eq!(harness.agent.called_units(), vec!["naming", "errors"]);
    assert_eq!(harness.callbacks.completed(), vec![job.id()]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancel_stops_the_pipeline_at_the_next_unit_boundary() {
    let gate = Arc::new(Notify::new());
    let scripted = agent().with_gate("u2", Arc::clone(&gate));
    let harness = Harness::started(
        scripted,
        &["u1", "u2", "u3", "u4", "u5"],
        EngineConfig::default().with_workers(1),
    );
    let job = harness.store_job(review_job()).await;
    let handle = harness.engine.submit(&job).await.expect("submit succeeds");

    harness.agent.wait_for_calls("u2", 1).await;
    let cancelled = harness.engine.cancel(job.id()).await.expect("cancel succeeds");
    assert_eq!(cancelled.status(), JobStatus::Cancelled);
    gate.notify_one();
    let finished = handle.wait().await.expect("job finishes");

    assert_eq!(finished.status(), JobStatus::Cancelled);
    assert_eq!(finished.error_message(), Some("cancelled by request"));
    assert!(finished.completed_at().is_none());
    assert_eq!(finished.progress().current_unit, 2);
    assert_eq!(
        harness.unit_statuses(job.id()).await,
        vec![
            UnitStatus::Completed,
            UnitStatus::Completed,
            UnitStatus::Pending,
            UnitStatus::Pending,
            UnitStatus::Pending,
        ]
    );
    assert_eq!(harness.agent.called_units(), vec!["u1", "u2"]);
    assert_eq!(
        harness.callbacks.errored(),
        vec![(job.id(), JobStatus::Cancelled)]
    );
    assert!(harness.callbacks.completed().is_empty());
    harness.engine.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn cancel_rejects_terminal_and_unknown_jobs() {
    let harness = Harness::idle(agent(), &["naming"], EngineConfig::default());
    let job = harness.store_job(review_job()).await;
    fail_job(&harness, job.id()).await;

    let terminal = harness.engine.cancel(job.id()).await;
    let unknown = harness.engine.cancel(JobId::new()).await;

    assert!(matches!(
        terminal,
        Err(EngineError::InvalidState {
            status: JobStatus::Failed,
            operation: "cancel",
            ..
        })
    ));
    assert!(matches!(unknown, Err(EngineError::NotFound(_))));
}

#[rstest]
#[tokio::test]
async fn retry_resets_a_failed_job_to_pending() {
    let harness = Harness::idle(agent(), &["naming"], EngineConfig::default());
    let job = harness.store_job(review_job()).await;
    fail_job(&harness, job.id()).await;

    harness.engine.retry(job.id()).await.expect("retry accepted");

    let progress = harness.engine.get_progress(job.id()).await.expect("progress");
    assert_eq!(progress.status, JobStatus::Pending);
    assert!(progress.error_message.is_none());
    let stored = harness.job(job.id()).await;
    assert_eq!(stored.retry_count(), 1);
    assert!(stored.started_at().is_none());
    assert!(stored.completed_at().is_none());
}

async fn move_to(harness: &Harness, job_id: JobId, path: &[JobStatus]) {
    let mut current = JobStatus::Pending;
    for target in path {
        let rows = harness
            .store
            .update_status_if_allowed(job_id, *target, &[current], Utc::now(), None)
            .await
            .expect("transition runs");
        assert_eq!(rows, 1);
        current = *target;
    }
}

#[rstest]
#[case(&[])]
#[case(&[JobStatus::Running])]
#[case(&[JobStatus::Running, JobStatus::Completed])]
#[tokio::test]
async fn retry_requires_a_failed_or_cancelled_job(#[case] path: &[JobStatus]) {
    let harness = Harness::idle(agent(), &["naming"], EngineConfig::default());
    let job = harness.store_job(review_job()).await;
    move_to(&harness, job.id(), path).await;
    let before = harness.job(job.id()).await;

    let rejected = harness.engine.retry(job.id()).await;
    let unknown = harness.engine.retry(JobId::new()).await;

    assert!(
        matches!(
            &rejected,
            Err(EngineError::InvalidState { status, operation: "retry", .. })
                if *status == before.status()
        ),
        "unexpected retry result: {rejected:?}"
    );
    assert!(matches!(unknown, Err(EngineError::NotFound(_))));
    let after = harness.job(job.id()).await;
    assert_eq!(after.status(), before.status());
    assert_eq!(after.retry_count(), before.retry_count());
    assert_eq!(after.started_at(), before.started_at());
    assert_eq!(after.completed_at(), before.completed_at());
    assert_eq!(after.error_message(), before.error_message());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn retry_reruns_only_units_that_did_not_complete() {
    let scripted = agent()
        .with_failure("errors", "model overloaded")
        .with_output("errors", findings("high", "unchecked error"));
    let harness = Harness::started(
        scripted,
        &["naming", "errors", "tests"],
        EngineConfig::default(),
    );
    let job = harness.store_job(review_job()).await;

    let failed = harness
        .engine
        .submit(&job)
        .await
        .expect("submit succeeds")
        .wait()
        .await
        .expect("job finishes");
    assert_eq!(failed.status(), JobStatus::Failed);
    assert_eq!(
        failed.error_message(),
        Some("1 of 3 units failed; errors: agent reviewer failed: model overloaded")
    );

    let retried = harness
        .engine
        .retry(job.id())
        .await
        .expect("retry accepted")
        .wait()
        .await
        .expect("job finishes");

    assert_eq!(retried.status(), JobStatus::Completed);
    assert_eq!(retried.retry_count(), 1);
    assert!(retried.error_message().is_none());
    assert_eq!(
        harness.agent.called_units(),
        vec!["naming", "errors", "tests", "errors"]
    );
    assert_eq!(
        harness.callbacks.errored(),
        vec![(job.id(), JobStatus::Failed)]
    );
    assert_eq!(harness.callbacks.completed(), vec![job.id()]);
    harness.engine.shutdown().await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn progress_never_moves_backwards() {
    let scripted = ["a", "b", "c", "d"]
        .into_iter()
        .fold(agent(), |scripted, unit| {
            scripted.with_delay(unit, Duration::from_millis(15))
        });
    let harness = Harness::started(scripted, &["a", "b", "c", "d"], EngineConfig::default());
    let job = harness.store_job(review_job()).await;
    let handle = harness.engine.submit(&job).await.expect("submit succeeds");

    let mut observed = Vec::new();
    loop {
        let progress = handle.progress().await.expect("progress");
        observed.push(progress.current_unit);
        if progress.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(observed.windows(2).all(|pair| pair.first() <= pair.get(1)));
    assert_eq!(observed.last(), Some(&4));
    harness.engine.shutdown().await;
}

#[rstest]
#[case(PipelinePolicy::stop_on_failure(), JobStatus::Failed, UnitStatus::Pending)]
#[case(PipelinePolicy::best_effort(), JobStatus::Completed, UnitStatus::Completed)]
#[tokio::test(flavor = "multi_thread")]
async fn failure_policy_decides_the_terminal_status(
    #[case] policy: PipelinePolicy,
    #[case] expected_job: JobStatus,
    #[case] expected_last_unit: UnitStatus,
) {
    let scripted = agent().with_failure("r2", "model overloaded");
    let harness = Harness::started(
        scripted,
        &["r1", "r2", "r3"],
        EngineConfig::default().with_pipeline(policy),
    );
    let job = harness.store_job(review_job()).await;

    let finished = harness
        .engine
        .submit(&job)
        .await
        .expect("submit succeeds")
        .wait()
        .await
        .expect("job finishes");

    assert_eq!(finished.status(), expected_job);
    assert_eq!(
        harness.unit_statuses(job.id()).await,
        vec![UnitStatus::Completed, UnitStatus::Failed, expected_last_unit]
    );
    harness.engine.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn submit_rejects_unknown_and_non_pending_jobs() {
    let harness = Harness::idle(agent(), &["naming"], EngineConfig::default());
    let failed = harness.store_job(review_job()).await;
    fail_job(&harness, failed.id()).await;

    let unknown = harness.engine.submit(&review_job()).await;
    let not_pending = harness.engine.submit(&failed).await;

    assert!(matches!(unknown, Err(EngineError::NotFound(_))));
    assert!(matches!(
        not_pending,
        Err(EngineError::InvalidState {
            status: JobStatus::Failed,
            operation: "submit",
            ..
        })
    ));
}

#[rstest]
#[tokio::test]
async fn full_queue_reports_unavailable_or_times_out() {
    let harness = Harness::idle(
        agent(),
        &["naming"],
        EngineConfig::default().with_queue_capacity(1),
    );
    let first = harness.store_job(review_job()).await;
    let second = harness.store_job(review_job()).await;
    harness.engine.submit(&first).await.expect("first fits");

    let requeued = harness.engine.submit(&first).await;
    let fail_fast = harness.engine.submit(&second).await;
    let bounded = harness
        .engine
        .submit_with(&second, SubmitMode::BlockFor(Duration::from_millis(20)))
        .await;

    assert!(requeued.is_ok());
    assert!(matches!(fail_fast, Err(EngineError::Unavailable)));
    assert!(matches!(bounded, Err(EngineError::SubmitTimeout(_))));
    assert_eq!(
        harness.job(second.id()).await.status(),
        JobStatus::Pending
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_stops_accepting_work() {
    let harness = Harness::started(agent(), &["naming"], EngineConfig::default());
    let job = harness.store_job(review_job()).await;

    harness.engine.shutdown().await;
    let result = harness.engine.submit(&job).await;

    assert!(matches!(result, Err(EngineError::Unavailable)));
    assert_eq!(harness.job(job.id()).await.status(), JobStatus::Pending);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn pending_jobs_are_resubmitted_after_restart() {
    let harness = Harness::idle(agent(), &["naming"], EngineConfig::default());
    let first = harness.store_job(review_job()).await;
    let second = harness.store_job(review_job()).await;

    let added = harness.engine.resubmit_pending().await.expect("resubmit");
    harness.engine.start();

    assert_eq!(added, 2);
    for job in [first, second] {
        let finished = loop {
            let current = harness.job(job.id()).await;
            if current.status().is_terminal() {
                break current;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        };
        assert_eq!(finished.status(), JobStatus::Completed);
    }
    harness.engine.shutdown().await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unit_retry_reruns_one_failed_unit() {
    let scripted = agent()
        .with_failure("errors", "model overloaded")
        .with_output("errors", findings("medium", "swallowed error"));
    let harness = Harness::started(scripted, &["naming", "errors"], EngineConfig::default());
    let job = harness.store_job(review_job()).await;
    harness
        .engine
        .submit(&job)
        .await
        .expect("submit succeeds")
        .wait()
        .await
        .expect("job finishes");
    let units = harness.store.find_units(job.id()).await.expect("units load");
    let completed = units.first().expect("first unit").clone();
    let failed = units.get(1).expect("second unit").clone();

    let rejected = harness.engine.retry_unit(job.id(), completed.id()).await;
    let foreign = harness.engine.retry_unit(JobId::new(), failed.id()).await;
    let retried = harness
        .engine
        .retry_unit(job.id(), failed.id())
        .await
        .expect("unit retry accepted")
        .wait()
        .await
        .expect("unit retry finishes");

    assert!(matches!(
        rejected,
        Err(EngineError::InvalidUnitState {
            status: UnitStatus::Completed,
            ..
        })
    ));
    assert!(matches!(foreign, Err(EngineError::NotFound(_) | EngineError::UnitNotFound(_))));
    assert_eq!(retried.status(), UnitStatus::Completed);
    assert_eq!(retried.retry_count(), 1);
    assert_eq!(harness.job(job.id()).await.status(), JobStatus::Failed);

    let rerun = harness
        .engine
        .retry(job.id())
        .await
        .expect("retry accepted")
        .wait()
        .await
        .expect("job finishes");
    assert_eq!(rerun.status(), JobStatus::Completed);
    assert_eq!(
        harness.agent.called_units(),
        vec!["naming", "errors", "errors"]
    );
    harness.engine.shutdown().await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn shutdown_waits_for_a_unit_retry_in_flight() {
    let gate = Arc::new(Notify::new());
    let scripted = agent()
        .with_failure("errors", "model overloaded")
        .with_output("errors", findings("medium", "swallowed error"))
        .with_gate("errors", Arc::clone(&gate));
    let harness = Harness::started(scripted, &["naming", "errors"], EngineConfig::default());
    let job = harness.store_job(review_job()).await;
    gate.notify_one();
    harness
        .engine
        .submit(&job)
        .await
        .expect("submit succeeds")
        .wait()
        .await
        .expect("job finishes");
    let failed = harness
        .store
        .find_units(job.id())
        .await
        .expect("units load")
        .get(1)
        .expect("second unit")
        .clone();

    let _retry = harness
        .engine
        .retry_unit(job.id(), failed.id())
        .await
        .expect("unit retry accepted");
    harness.agent.wait_for_calls("errors", 2).await;
    let engine = harness.engine.clone();
    let mut stopping = tokio::spawn(async move { engine.shutdown().await });
    let early = tokio::time::timeout(Duration::from_millis(50), &mut stopping).await;
    assert!(early.is_err(), "shutdown returned while the unit retry was running");

    gate.notify_one();
    stopping.await.expect("shutdown task joins");

    assert_eq!(
        harness.unit_statuses(job.id()).await,
        vec![UnitStatus::Completed, UnitStatus::Completed]
    );
    assert!(matches!(
        harness.engine.retry_unit(job.id(), failed.id()).await,
        Err(EngineError::Unavailable)
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reaper_fails_jobs_running_past_the_timeout() {
    let gate = Arc::new(Notify::new());
    let scripted = agent().with_gate("slow", Arc::clone(&gate));
    let harness = Harness::started(
        scripted,
        &["slow", "after"],
        EngineConfig::default()
            .with_workers(1)
            .with_job_timeout(Duration::from_millis(100), Duration::from_secs(3600)),
    );
    let job = harness.store_job(review_job()).await;
    let handle = harness.engine.submit(&job).await.expect("submit succeeds");
    harness.agent.wait_for_calls("slow", 1).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    let reaped = harness.engine.reap_expired().await.expect("reaper pass");
    assert_eq!(reaped, 1);
    assert!(harness.callbacks.errored().is_empty());
    gate.notify_one();
    let finished = handle.wait().await.expect("job finishes");

    assert_eq!(finished.status(), JobStatus::Failed);
    assert_eq!(
        finished.error_message(),
        Some("job exceeded timeout of 100ms")
    );
    assert_eq!(harness.agent.called_units(), vec!["slow"]);
    assert_eq!(
        harness.callbacks.errored(),
        vec![(job.id(), JobStatus::Failed)]
    );
    harness.engine.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn reaper_is_disabled_without_a_job_timeout() {
    let harness = Harness::idle(agent(), &["naming"], EngineConfig::default());

    assert_eq!(harness.engine.reap_expired().await.expect("reaper pass"), 0);
}
