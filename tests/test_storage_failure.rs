mod common;

use common::*;
use cryptoadvisor::application::orchestrator::ReviewRequest;
use cryptoadvisor::domain::values::review::{ReviewPhase, RunStatus};
use cryptoadvisor::domain::values::tier::UserTier;
use cryptoadvisor::ReviewEngine;

#[tokio::test]
async fn test_store_failure_fails_run_in_storing_phase() {
    let (collaborators, failing) =
        collaborators_with_failing_store(mixed_market(), ScriptedJudge::accepting(0.9));
    let engine = ReviewEngine::from_collaborators(test_config(), collaborators);
    engine.add_user("alice", UserTier::Premium, None).unwrap();
    engine.open_position("alice", "BTCUSDT", 0.1, 50_000.0, None).unwrap();

    let report = engine.run_now(ReviewRequest::scheduled()).await.unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.phase, ReviewPhase::Storing);
    let message = report.error_message.clone().unwrap();
    assert!(message.contains("storing recommendations"), "{message}");
    assert_eq!(*failing.attempts.lock().unwrap(), 1);

    let run = engine.audit_get(&report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.phase, ReviewPhase::Storing);
    assert!(run.error_message.unwrap().contains("disk I/O error"));

    assert!(engine.discovery_recommendations(None, None, true, None).unwrap().is_empty());
    assert!(engine.portfolio_recommendations(None, true, None).unwrap().is_empty());

    let stats = engine.audit_stats().unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.failures_by_phase, vec![("storing".to_string(), 1)]);
}

#[tokio::test]
async fn test_lock_released_after_failed_run() {
    let (collaborators, _) = collaborators_with_failing_store(mixed_market(), ScriptedJudge::accepting(0.9));
    let engine = ReviewEngine::from_collaborators(test_config(), collaborators);

    engine.run_now(ReviewRequest::scheduled()).await.unwrap();
    assert!(!engine.scheduler_state().is_busy());
    assert!(engine.run_now(ReviewRequest::manual("retry")).await.is_ok());
}
