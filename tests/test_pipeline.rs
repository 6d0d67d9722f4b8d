mod common;

use common::*;
use cryptoadvisor::application::orchestrator::ReviewRequest;
use cryptoadvisor::domain::values::review::{ReviewPhase, ReviewType, RunStatus};
use cryptoadvisor::domain::values::sell_reason::SellReason;
use cryptoadvisor::domain::values::strategy::Strategy;
use cryptoadvisor::domain::values::tier::UserTier;
use cryptoadvisor::ReviewEngine;

/// alice (premium): BTC at +22% (profit target), ETH flat (no rule),
/// SOL trailing stop just under price at +40% (stop wins over profit).
/// bob (free): one position, denied by the tier gate on scheduled runs.
fn seed_accounts(engine: &ReviewEngine) {
    engine.add_user("alice", UserTier::Premium, None).unwrap();
    engine.add_user("bob", UserTier::Free, None).unwrap();
    engine.open_position("alice", "BTCUSDT", 0.1, 50_000.0, None).unwrap();
    engine.open_position("alice", "ETHUSDT", 2.0, 3_000.0, None).unwrap();
    engine.open_position("alice", "SOLUSDT", 10.0, 100.0, Some(139.0)).unwrap();
    engine.open_position("bob", "BTCUSDT", 0.5, 40_000.0, None).unwrap();
}

#[tokio::test]
async fn test_full_run_counts_add_up() {
    let engine = setup(mixed_market(), ScriptedJudge::accepting(0.9).reject_buy("ETHUSDT"));
    seed_accounts(&engine);

    let report = engine.run_now(ReviewRequest::manual("tests")).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.phase, ReviewPhase::Completed);
    assert_eq!(report.review_type, ReviewType::Manual);
    let c = report.counts;
    assert!(c.is_balanced(), "{c:?}");
    assert_eq!(c.coins_analyzed, 5);

    assert_eq!(c.buy_candidates, 5);
    assert_eq!(c.buy_count, 1);
    assert_eq!(c.ai_rejected_buy, 1);
    assert_eq!(c.skipped_buy, 3);

    assert_eq!(c.sell_candidates, 4);
    assert_eq!(c.sell_count, 2);
    assert_eq!(c.ai_rejected_sell, 0);
    assert_eq!(c.skipped_sell, 2);
    assert_eq!(c.tier_denied, 1);
    assert!(report.market_conditions.is_some());
}

#[tokio::test]
async fn test_single_audit_row_updated_in_place() {
    let engine = setup(mixed_market(), ScriptedJudge::accepting(0.9).reject_buy("ETHUSDT"));
    seed_accounts(&engine);

    let report = engine.run_now(ReviewRequest::manual("ops")).await.unwrap();

    let runs = engine.audit_list(None, None, None, None).unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.id, report.run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.phase, ReviewPhase::Completed);
    assert_eq!(run.buy_count, 1);
    assert_eq!(run.sell_count, 2);
    assert_eq!(run.skipped_count, 5);
    assert_eq!(run.coins_analyzed, 5);
    assert!(run.error_message.is_none());
    assert_eq!(run.metadata.requested_by.as_deref(), Some("ops"));
    assert_eq!(run.metadata.buy_candidates, Some(5));
    assert_eq!(run.metadata.tier_denied, Some(1));
    assert_eq!(run.metadata.strategies, vec!["moderate/top25".to_string()]);
    assert!(run.metadata.market_conditions.is_some());
    assert!(!run.metadata.timed_out);
}

#[tokio::test]
async fn test_recommendations_are_stored() {
    let engine = setup(mixed_market(), ScriptedJudge::accepting(0.9).reject_buy("ETHUSDT"));
    seed_accounts(&engine);
    engine.run_now(ReviewRequest::scheduled()).await.unwrap();

    let buys = engine.discovery_recommendations(None, None, false, None).unwrap();
    assert_eq!(buys.len(), 1);
    let btc = &buys[0];
    assert_eq!(btc.symbol, "BTCUSDT");
    assert_eq!(btc.strategy, Strategy::Moderate);
    assert!(btc.stop_loss < btc.entry_price);
    assert!(btc.entry_price < btc.take_profit_levels[0]);
    assert!(btc.take_profit_levels[0] <= btc.take_profit_levels[1]);
    assert!(btc.expires_at > btc.created_at);
    assert!((btc.entry_price - 61_000.0).abs() < 1e-9);

    let sells = engine
        .portfolio_recommendations(Some("alice".into()), false, None)
        .unwrap();
    assert_eq!(sells.len(), 2);
    let reason_of = |symbol: &str| {
        sells
            .iter()
            .find(|r| r.symbol == symbol)
            .map(|r| r.sell_reason)
            .unwrap()
    };
    assert_eq!(reason_of("BTCUSDT"), SellReason::ProfitTarget);
    assert_eq!(reason_of("SOLUSDT"), SellReason::RiskManagement);

    for rec in &sells {
        let expected = (rec.current_price - rec.entry_price) * rec.quantity;
        assert!((rec.unrealized_pnl - expected).abs() < 1e-6);
        let pct = rec.unrealized_pnl / (rec.entry_price * rec.quantity) * 100.0;
        assert!((rec.percent_gain - pct).abs() < 1e-6);
    }

    assert!(engine
        .portfolio_recommendations(Some("bob".into()), false, None)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_second_run_skips_active_recommendations() {
    let engine = setup(mixed_market(), ScriptedJudge::accepting(0.9).reject_buy("ETHUSDT"));
    seed_accounts(&engine);
    engine.run_now(ReviewRequest::scheduled()).await.unwrap();

    let second = engine.run_now(ReviewRequest::scheduled()).await.unwrap();
    let c = second.counts;
    assert_eq!(second.status, RunStatus::Completed);
    assert!(c.is_balanced(), "{c:?}");
    assert_eq!(c.buy_count, 0);
    assert_eq!(c.sell_count, 0);
    assert_eq!(c.skipped_buy, 4);
    assert_eq!(c.ai_rejected_buy, 1);
    assert_eq!(c.skipped_sell, 4);

    assert_eq!(engine.discovery_recommendations(None, None, false, None).unwrap().len(), 1);
    assert_eq!(engine.audit_list(None, None, None, None).unwrap().len(), 2);
}

#[tokio::test]
async fn test_universe_failure_fails_run_at_discovery() {
    let engine = setup(FakeMarket::new().failing_universe(), ScriptedJudge::accepting(0.9));

    let report = engine.run_now(ReviewRequest::scheduled()).await.unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.phase, ReviewPhase::Discovery);
    assert!(report.error_message.unwrap().contains("unavailable"));

    let run = engine.audit_get(&report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.phase, ReviewPhase::Discovery);
    assert!(run.error_message.is_some());
}

#[tokio::test]
async fn test_ai_low_confidence_is_rejected_by_strategy() {
    // Moderate needs 0.65; the judge accepts but is unsure.
    let engine = setup(mixed_market(), ScriptedJudge::accepting(0.6));

    let report = engine.run_now(ReviewRequest::scheduled()).await.unwrap();
    let c = report.counts;
    assert!(c.is_balanced(), "{c:?}");
    assert_eq!(c.buy_count, 0);
    assert_eq!(c.ai_rejected_buy, 2);
    assert!(engine.discovery_recommendations(None, None, false, None).unwrap().is_empty());
}

#[tokio::test]
async fn test_assess_market_does_not_start_a_run() {
    let engine = setup(mixed_market(), ScriptedJudge::accepting(0.9));
    let conditions = engine.assess_market().await.unwrap();
    assert!(conditions.review_interval_minutes >= 5);
    assert!(conditions.review_interval_minutes <= 240);
    assert!(engine.audit_list(None, None, None, None).unwrap().is_empty());
    assert!(!engine.scheduler_state().is_busy());
}
