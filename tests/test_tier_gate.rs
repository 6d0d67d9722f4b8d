mod common;

use common::*;
use cryptoadvisor::application::orchestrator::ReviewRequest;
use cryptoadvisor::domain::error::DomainError;
use cryptoadvisor::domain::values::review::{ReviewPhase, RunStatus};
use cryptoadvisor::domain::values::tier::UserTier;

#[tokio::test]
async fn test_free_user_fourth_on_demand_review_denied() {
    let engine = setup(mixed_market(), ScriptedJudge::accepting(0.9));
    engine.add_user("carol", UserTier::Free, None).unwrap();
    engine.open_position("carol", "ETHUSDT", 1.0, 3_000.0, None).unwrap();
    assert_eq!(engine.on_demand_remaining("carol").unwrap(), Some(3));

    for round in 0..3 {
        let report = engine
            .run_now(ReviewRequest::manual("carol").on_behalf_of("carol"))
            .await
            .unwrap();
        assert_eq!(report.counts.tier_denied, 0, "round {round}");
        assert_eq!(report.counts.skipped_sell, 1);
    }
    assert_eq!(engine.on_demand_remaining("carol").unwrap(), Some(0));

    let denied = engine
        .run_now(ReviewRequest::manual("carol").on_behalf_of("carol"))
        .await
        .unwrap();
    assert_eq!(denied.status, RunStatus::Completed);
    assert_eq!(denied.counts.tier_denied, 1);
    assert_eq!(denied.counts.sell_candidates, 1);
    assert_eq!(denied.counts.skipped_sell, 1);
    assert!(denied.counts.is_balanced());

    let run = engine.audit_get(&denied.run_id).unwrap();
    assert_eq!(run.metadata.tier_denied, Some(1));
    assert_eq!(run.metadata.extra.get("user_id").map(String::as_str), Some("carol"));
}

#[tokio::test]
async fn test_premium_on_demand_never_denied() {
    let engine = setup(mixed_market(), ScriptedJudge::accepting(0.9));
    engine.add_user("dave", UserTier::Premium, None).unwrap();
    engine.open_position("dave", "BTCUSDT", 0.2, 45_000.0, None).unwrap();

    for _ in 0..5 {
        let report = engine
            .run_now(ReviewRequest::manual("dave").on_behalf_of("dave"))
            .await
            .unwrap();
        assert_eq!(report.counts.tier_denied, 0);
        assert_eq!(report.counts.sell_count, 1);
    }
    assert_eq!(engine.on_demand_remaining("dave").unwrap(), None);

    // each on-demand review supersedes the previous sell recommendation
    let active = engine.portfolio_recommendations(Some("dave".into()), false, None).unwrap();
    assert_eq!(active.len(), 1);
    let history = engine.portfolio_recommendations(Some("dave".into()), true, None).unwrap();
    assert_eq!(history.len(), 5);
}

#[tokio::test]
async fn test_scheduled_monitoring_needs_monitoring_capability() {
    let engine = setup(mixed_market(), ScriptedJudge::accepting(0.9));
    engine.add_user("erin", UserTier::Free, Some(10)).unwrap();
    engine.open_position("erin", "BTCUSDT", 0.2, 45_000.0, None).unwrap();

    let report = engine.run_now(ReviewRequest::scheduled()).await.unwrap();
    assert_eq!(report.counts.tier_denied, 1);
    assert_eq!(report.counts.sell_count, 0);
    // scheduled denial does not touch the on-demand quota
    assert_eq!(engine.on_demand_remaining("erin").unwrap(), Some(10));
}

#[tokio::test]
async fn test_on_demand_for_unknown_user_fails_run() {
    let engine = setup(mixed_market(), ScriptedJudge::accepting(0.9));
    let report = engine
        .run_now(ReviewRequest::manual("ops").on_behalf_of("nobody"))
        .await
        .unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.phase, ReviewPhase::Discovery);
    assert!(matches!(engine.on_demand_remaining("nobody"), Err(DomainError::NotFound(_))));
}
