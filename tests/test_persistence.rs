mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use cryptoadvisor::application::audit::INTERRUPTED_MESSAGE;
use cryptoadvisor::application::orchestrator::ReviewRequest;
use cryptoadvisor::domain::entities::review_run::ReviewRun;
use cryptoadvisor::domain::ports::audit_log::{AuditLog, AuditPatch};
use cryptoadvisor::domain::values::review::{ReviewType, RunStatus};
use cryptoadvisor::domain::values::run_metadata::RunMetadata;
use cryptoadvisor::domain::values::tier::UserTier;
use cryptoadvisor::infrastructure::sqlite::audit_repo::SqliteAuditLog;
use cryptoadvisor::infrastructure::sqlite::open_connection;
use cryptoadvisor::ReviewEngine;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("advisor.db");
    let db = db.to_str().unwrap();

    let run_id = {
        let engine = setup_db(db);
        engine.add_user("alice", UserTier::Premium, None).unwrap();
        engine.open_position("alice", "BTCUSDT", 0.1, 50_000.0, None).unwrap();
        engine.run_now(ReviewRequest::scheduled()).await.unwrap().run_id
    };

    let engine = setup_db(db);
    assert_eq!(engine.audit_get(&run_id).unwrap().status, RunStatus::Completed);
    assert_eq!(engine.users().unwrap().len(), 1);
    assert_eq!(engine.positions("alice").unwrap().len(), 1);
    assert_eq!(engine.discovery_recommendations(None, None, false, None).unwrap().len(), 2);
    assert_eq!(
        engine
            .portfolio_recommendations(Some("alice".into()), false, None)
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_run_left_started_is_recovered_on_next_start() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("advisor.db");
    let db = db.to_str().unwrap();

    // a process that died mid-run an hour ago
    let log = SqliteAuditLog::new(open_connection(db).unwrap());
    let mut run = ReviewRun::start(ReviewType::Scheduled, RunMetadata::default());
    run.timestamp = Utc::now() - ChronoDuration::hours(1);
    let orphan = log.insert(&run).unwrap();
    drop(log);

    let engine = setup_db(db);
    assert_eq!(engine.recover_interrupted().unwrap(), 1);
    let run = engine.audit_get(&orphan).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.unwrap().starts_with("interrupted"));
}

#[tokio::test]
async fn test_live_run_in_other_process_is_not_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("advisor.db");
    let db = db.to_str().unwrap();

    let running = setup_db_with(db, mixed_market().slow(Duration::from_millis(400)));
    let handle = running.trigger(ReviewRequest::scheduled()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let in_flight = running.audit_list(None, Some(RunStatus::Started), None, None).unwrap();
    assert_eq!(in_flight.len(), 1);
    let run_id = in_flight[0].id.clone();

    let starting = setup_db(db);
    assert_eq!(starting.recover_interrupted().unwrap(), 0);
    assert_eq!(starting.audit_get(&run_id).unwrap().status, RunStatus::Started);

    // a stray failure written by some other process mid-run
    let log = SqliteAuditLog::new(open_connection(db).unwrap());
    log.update(
        &run_id,
        &AuditPatch {
            status: Some(RunStatus::Failed),
            error_message: Some(Some(INTERRUPTED_MESSAGE.to_string())),
            ..AuditPatch::default()
        },
    )
    .unwrap();

    let report = handle.wait().await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    let run = starting.audit_get(&run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.error_message.is_none());
}

#[tokio::test]
async fn test_on_demand_quota_shared_across_engines() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("advisor.db");
    let db = db.to_str().unwrap();

    let first = setup_db(db);
    first.add_user("carol", UserTier::Free, None).unwrap();
    first.open_position("carol", "ETHUSDT", 1.0, 3_000.0, None).unwrap();
    let second = setup_db(db);

    for engine in [&first, &second, &first] {
        let report = engine
            .run_now(ReviewRequest::manual("carol").on_behalf_of("carol"))
            .await
            .unwrap();
        assert_eq!(report.counts.tier_denied, 0);
    }
    assert_eq!(second.on_demand_remaining("carol").unwrap(), Some(0));

    let denied = second
        .run_now(ReviewRequest::manual("carol").on_behalf_of("carol"))
        .await
        .unwrap();
    assert_eq!(denied.counts.tier_denied, 1);

    drop(first);
    drop(second);
    let restarted = setup_db(db);
    assert_eq!(restarted.on_demand_remaining("carol").unwrap(), Some(0));
    let denied = restarted
        .run_now(ReviewRequest::manual("carol").on_behalf_of("carol"))
        .await
        .unwrap();
    assert_eq!(denied.counts.tier_denied, 1);
}

fn setup_db(db: &str) -> ReviewEngine {
    setup_db_with(db, mixed_market())
}

fn setup_db_with(db: &str, market: FakeMarket) -> ReviewEngine {
    ReviewEngine::with_providers(db, test_config(), Arc::new(market), Arc::new(ScriptedJudge::accepting(0.9)))
        .unwrap()
}
