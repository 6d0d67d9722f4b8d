//! Audit log port: one row per review run, patched in place as the run
//! progresses.

use crate::domain::entities::review_run::ReviewRun;
use crate::domain::error::DomainError;
use crate::domain::values::review::{ReviewPhase, ReviewType, RunStatus};
use crate::domain::values::run_metadata::RunMetadata;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Partial update of an audit row. `None` fields are left unchanged;
/// `error_message: Some(None)` clears the column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditPatch {
    pub status: Option<RunStatus>,
    pub phase: Option<ReviewPhase>,
    pub coins_analyzed: Option<u32>,
    pub buy_count: Option<u32>,
    pub sell_count: Option<u32>,
    pub skipped_count: Option<u32>,
    pub error_message: Option<Option<String>>,
    pub metadata: Option<RunMetadata>,
    pub duration_ms: Option<u64>,
}

impl AuditPatch {
    pub fn is_empty(&self) -> bool {
        *self == AuditPatch::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub review_type: Option<ReviewType>,
    pub status: Option<RunStatus>,
    pub since: Option<DateTime<Utc>>,
    /// Only runs started strictly before this instant.
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditStats {
    pub total_runs: usize,
    pub completed: usize,
    pub failed: usize,
    pub in_progress: usize,
    pub avg_duration_ms: f64,
    pub total_buy_recommendations: u64,
    pub total_sell_recommendations: u64,
    pub failures_by_phase: Vec<(String, usize)>,
    pub last_run_at: Option<DateTime<Utc>>,
}

pub trait AuditLog: Send + Sync {
    /// Insert a new run and return its id.
    fn insert(&self, run: &ReviewRun) -> Result<String, DomainError>;
    fn update(&self, id: &str, patch: &AuditPatch) -> Result<(), DomainError>;
    fn get(&self, id: &str) -> Result<Option<ReviewRun>, DomainError>;
    fn query(&self, filter: &AuditFilter) -> Result<Vec<ReviewRun>, DomainError>;
    fn aggregate(&self) -> Result<AuditStats, DomainError>;
    /// Keep the newest `keep_last` rows, returning how many were removed.
    fn prune(&self, keep_last: usize) -> Result<usize, DomainError>;
}
