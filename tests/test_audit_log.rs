use chrono::{Duration, Utc};
use cryptoadvisor::application::audit::{AuditUseCase, INTERRUPTED_MESSAGE};
use cryptoadvisor::domain::entities::review_run::ReviewRun;
use cryptoadvisor::domain::error::DomainError;
use cryptoadvisor::domain::ports::audit_log::{AuditLog, AuditPatch};
use cryptoadvisor::domain::values::review::{ReviewPhase, ReviewType, RunStatus};
use cryptoadvisor::domain::values::run_metadata::RunMetadata;
use cryptoadvisor::infrastructure::sqlite::audit_repo::SqliteAuditLog;
use cryptoadvisor::infrastructure::sqlite::open_connection;
use std::sync::Arc;

fn setup() -> (Arc<SqliteAuditLog>, AuditUseCase) {
    let log = Arc::new(SqliteAuditLog::new(open_connection(":memory:").unwrap()));
    let uc = AuditUseCase::new(log.clone(), std::time::Duration::from_secs(15 * 60));
    (log, uc)
}

/// A run started `minutes_ago`, already moved to `status`.
fn seed(log: &SqliteAuditLog, review_type: ReviewType, status: RunStatus, minutes_ago: i64) -> String {
    let mut run = ReviewRun::start(review_type, RunMetadata::default());
    run.timestamp = Utc::now() - Duration::minutes(minutes_ago);
    run.status = status;
    log.insert(&run).unwrap()
}

#[test]
fn test_partial_update_leaves_other_fields() {
    let (log, uc) = setup();
    let id = seed(&log, ReviewType::Scheduled, RunStatus::Started, 0);

    log.update(
        &id,
        &AuditPatch {
            phase: Some(ReviewPhase::AiAnalysis),
            coins_analyzed: Some(25),
            ..AuditPatch::default()
        },
    )
    .unwrap();
    log.update(
        &id,
        &AuditPatch {
            buy_count: Some(3),
            ..AuditPatch::default()
        },
    )
    .unwrap();

    let run = uc.get(&id).unwrap();
    assert_eq!(run.status, RunStatus::Started);
    assert_eq!(run.phase, ReviewPhase::AiAnalysis);
    assert_eq!(run.coins_analyzed, 25);
    assert_eq!(run.buy_count, 3);
    assert_eq!(run.sell_count, 0);
    assert!(run.error_message.is_none());
}

#[test]
fn test_get_unknown_run() {
    let (_, uc) = setup();
    assert!(matches!(uc.get("missing"), Err(DomainError::NotFound(_))));
}

#[test]
fn test_list_filters_and_orders_newest_first() {
    let (log, uc) = setup();
    seed(&log, ReviewType::Scheduled, RunStatus::Completed, 30);
    let manual = seed(&log, ReviewType::Manual, RunStatus::Failed, 20);
    let newest = seed(&log, ReviewType::Scheduled, RunStatus::Completed, 10);

    let all = uc.list(None, None, None, None).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id, newest);

    let manual_runs = uc.list(Some(ReviewType::Manual), None, None, None).unwrap();
    assert_eq!(manual_runs.len(), 1);
    assert_eq!(manual_runs[0].id, manual);

    let completed = uc.list(None, Some(RunStatus::Completed), None, Some(1)).unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, newest);

    let recent = uc
        .list(None, None, Some(Utc::now() - Duration::minutes(25)), None)
        .unwrap();
    assert_eq!(recent.len(), 2);
}

#[test]
fn test_stats_aggregate() {
    let (log, uc) = setup();
    let a = seed(&log, ReviewType::Scheduled, RunStatus::Completed, 30);
    let b = seed(&log, ReviewType::Scheduled, RunStatus::Failed, 20);
    let c = seed(&log, ReviewType::Manual, RunStatus::Failed, 10);
    seed(&log, ReviewType::Manual, RunStatus::Started, 1);

    log.update(&a, &AuditPatch { buy_count: Some(2), sell_count: Some(1), duration_ms: Some(1_000), ..AuditPatch::default() })
        .unwrap();
    log.update(&b, &AuditPatch { phase: Some(ReviewPhase::Storing), duration_ms: Some(3_000), ..AuditPatch::default() })
        .unwrap();
    log.update(&c, &AuditPatch { phase: Some(ReviewPhase::Storing), duration_ms: Some(2_000), ..AuditPatch::default() })
        .unwrap();

    let stats = uc.stats().unwrap();
    assert_eq!(stats.total_runs, 4);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.in_progress, 1);
    assert_eq!(stats.total_buy_recommendations, 2);
    assert_eq!(stats.total_sell_recommendations, 1);
    assert!((stats.avg_duration_ms - 2_000.0).abs() < 1e-9);
    assert_eq!(stats.failures_by_phase, vec![("storing".to_string(), 2)]);
    assert!(stats.last_run_at.is_some());
}

#[test]
fn test_prune_keeps_newest_and_in_flight() {
    let (log, uc) = setup();
    let stale_started = seed(&log, ReviewType::Scheduled, RunStatus::Started, 500);
    for minutes in [400, 300, 200, 100] {
        seed(&log, ReviewType::Scheduled, RunStatus::Completed, minutes);
    }
    let newest = seed(&log, ReviewType::Manual, RunStatus::Completed, 5);

    let removed = uc.prune(2).unwrap();
    assert_eq!(removed, 3);

    let remaining = uc.list(None, None, None, None).unwrap();
    assert_eq!(remaining.len(), 3);
    assert_eq!(remaining[0].id, newest);
    assert!(remaining.iter().any(|r| r.id == stale_started));
}

#[test]
fn test_recover_interrupted() {
    let (log, uc) = setup();
    let stale = seed(&log, ReviewType::Scheduled, RunStatus::Started, 60);
    let live = seed(&log, ReviewType::Manual, RunStatus::Started, 5);
    seed(&log, ReviewType::Scheduled, RunStatus::Completed, 30);

    assert_eq!(uc.recover_interrupted().unwrap(), 1);
    let run = uc.get(&stale).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error_message.as_deref(), Some(INTERRUPTED_MESSAGE));

    // younger than the run deadline, so possibly still running elsewhere
    let run = uc.get(&live).unwrap();
    assert_eq!(run.status, RunStatus::Started);
    assert!(run.error_message.is_none());
    assert_eq!(uc.recover_interrupted().unwrap(), 0);
}

#[test]
fn test_error_message_cleared_only_when_asked() {
    let (log, uc) = setup();
    let id = seed(&log, ReviewType::Scheduled, RunStatus::Started, 0);
    log.update(
        &id,
        &AuditPatch {
            status: Some(RunStatus::Failed),
            error_message: Some(Some(INTERRUPTED_MESSAGE.to_string())),
            ..AuditPatch::default()
        },
    )
    .unwrap();

    log.update(
        &id,
        &AuditPatch {
            phase: Some(ReviewPhase::Completed),
            ..AuditPatch::default()
        },
    )
    .unwrap();
    assert_eq!(uc.get(&id).unwrap().error_message.as_deref(), Some(INTERRUPTED_MESSAGE));

    log.update(
        &id,
        &AuditPatch {
            status: Some(RunStatus::Completed),
            error_message: Some(None),
            ..AuditPatch::default()
        },
    )
    .unwrap();
    let run = uc.get(&id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.error_message.is_none());
}
