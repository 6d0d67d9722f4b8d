mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use cryptoadvisor::application::orchestrator::ReviewRequest;
use cryptoadvisor::application::scheduler::TickOutcome;
use cryptoadvisor::domain::error::ReviewError;
use cryptoadvisor::domain::values::review::{ReviewPhase, ReviewType, RunStatus};
use std::time::Duration;

#[tokio::test]
async fn test_manual_trigger_while_busy_is_rejected() {
    let engine = setup(mixed_market().slow(Duration::from_millis(300)), ScriptedJudge::accepting(0.9));

    let handle = match engine.tick(Utc::now()) {
        TickOutcome::Started(handle) => handle,
        _ => panic!("first tick should start a run"),
    };
    assert_eq!(handle.review_type, ReviewType::Scheduled);
    assert!(engine.scheduler_state().is_busy());

    assert!(matches!(
        engine.trigger(ReviewRequest::manual("impatient")),
        Err(ReviewError::LockBusy)
    ));
    assert!(matches!(engine.tick(Utc::now()), TickOutcome::Busy));

    let report = handle.wait().await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);

    let runs = engine.audit_list(None, None, None, None).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].review_type, ReviewType::Scheduled);
    assert_eq!(engine.scheduler_state().runs_started, 1);
}

#[tokio::test]
async fn test_next_run_scheduled_from_assessed_interval() {
    let engine = setup(mixed_market(), ScriptedJudge::accepting(0.9));

    let report = engine.run_now(ReviewRequest::scheduled()).await.unwrap();
    let interval = report.market_conditions.unwrap().review_interval_minutes;

    let state = engine.scheduler_state();
    assert!(!state.is_busy());
    assert_eq!(state.last_interval_minutes, Some(interval));
    let last = state.last_run_at.unwrap();
    assert_eq!(state.next_due_at, Some(last + ChronoDuration::minutes(i64::from(interval))));

    match engine.tick(Utc::now()) {
        TickOutcome::NotDue { next_due_at } => assert_eq!(Some(next_due_at), state.next_due_at),
        _ => panic!("run should not be due right after completion"),
    }
    let later = state.next_due_at.unwrap() + ChronoDuration::seconds(1);
    match engine.tick(later) {
        TickOutcome::Started(handle) => {
            handle.wait().await.unwrap();
        }
        _ => panic!("run should be due after the interval"),
    }
}

#[tokio::test]
async fn test_manual_trigger_ignores_due_time() {
    let engine = setup(mixed_market(), ScriptedJudge::accepting(0.9));
    engine.run_now(ReviewRequest::scheduled()).await.unwrap();
    assert!(!engine.scheduler_state().is_due(Utc::now()));

    let report = engine
        .run_now(ReviewRequest::triggered("btc moved 8% in an hour"))
        .await
        .unwrap();
    assert_eq!(report.review_type, ReviewType::Triggered);
    let run = engine.audit_get(&report.run_id).unwrap();
    assert_eq!(run.metadata.trigger_reason.as_deref(), Some("btc moved 8% in an hour"));
}

#[tokio::test]
async fn test_timeout_force_fails_run_and_releases_lock() {
    let mut config = test_config();
    config.scheduler.max_run_duration = Duration::from_millis(50);
    config.scheduler.fallback_interval_minutes = 42;
    let engine = setup_with(
        mixed_market().slow(Duration::from_millis(500)),
        ScriptedJudge::accepting(0.9),
        config,
    );

    let report = engine.run_now(ReviewRequest::manual("ops")).await.unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.phase, ReviewPhase::Discovery);
    assert!(report.error_message.as_deref().unwrap().contains("timed out"));

    let run = engine.audit_get(&report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.metadata.timed_out);
    assert!(run.error_message.unwrap().contains("timed out"));

    let state = engine.scheduler_state();
    assert!(!state.is_busy());
    assert_eq!(state.last_interval_minutes, Some(42));

    assert!(engine.discovery_recommendations(None, None, true, None).unwrap().is_empty());
}

#[tokio::test]
async fn test_lock_held_for_whole_run_and_assessed_interval_recorded() {
    let mut config = test_config();
    config.scheduler.fallback_interval_minutes = 1;
    let engine = setup_with(
        mixed_market().slow(Duration::from_millis(400)),
        ScriptedJudge::accepting(0.9),
        config,
    );

    let handle = engine.trigger(ReviewRequest::scheduled()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(engine.scheduler_state().is_busy());
    for _ in 0..3 {
        assert!(matches!(
            engine.trigger(ReviewRequest::manual("second operator")),
            Err(ReviewError::LockBusy)
        ));
    }
    let in_flight = engine.audit_list(None, Some(RunStatus::Started), None, None).unwrap();
    assert_eq!(in_flight.len(), 1);

    let report = handle.wait().await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    let interval = report.market_conditions.unwrap().review_interval_minutes;
    assert_ne!(interval, 1);

    assert!(engine.audit_list(None, Some(RunStatus::Started), None, None).unwrap().is_empty());
    assert_eq!(engine.audit_list(None, None, None, None).unwrap().len(), 1);
    let state = engine.scheduler_state();
    assert!(!state.is_busy());
    assert_eq!(state.last_interval_minutes, Some(interval));
}
