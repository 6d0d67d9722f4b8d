use crate::domain::entities::review_run::ReviewRun;
use crate::domain::error::DomainError;
use crate::domain::ports::audit_log::{AuditFilter, AuditLog, AuditPatch, AuditStats};
use crate::domain::values::review::{ReviewType, RunStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const INTERRUPTED_MESSAGE: &str = "interrupted: process exited while the run was in flight";

pub struct AuditUseCase {
    audit: Arc<dyn AuditLog>,
    /// Age past which a `started` row cannot belong to a live run.
    stale_after: Duration,
}

impl AuditUseCase {
    pub fn new(audit: Arc<dyn AuditLog>, stale_after: Duration) -> Self {
        Self { audit, stale_after }
    }

    pub fn list(
        &self,
        review_type: Option<ReviewType>,
        status: Option<RunStatus>,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<ReviewRun>, DomainError> {
        self.audit.query(&AuditFilter {
            review_type,
            status,
            since,
            before: None,
            limit,
        })
    }

    pub fn get(&self, id: &str) -> Result<ReviewRun, DomainError> {
        self.audit
            .get(id)?
            .ok_or_else(|| DomainError::NotFound(format!("Review run not found: {id}")))
    }

    pub fn stats(&self) -> Result<AuditStats, DomainError> {
        self.audit.aggregate()
    }

    pub fn prune(&self, keep_last: usize) -> Result<usize, DomainError> {
        let removed = self.audit.prune(keep_last)?;
        info!(removed, keep_last, "Pruned audit log");
        Ok(removed)
    }

    /// Mark rows left in `started` by a dead process as failed. Only rows
    /// older than the run deadline qualify, since any live run, in this
    /// process or another sharing the database, is younger than that.
    pub fn recover_interrupted(&self) -> Result<usize, DomainError> {
        let cutoff = match chrono::Duration::from_std(self.stale_after)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        {
            Some(cutoff) => cutoff,
            None => return Ok(0),
        };
        let stale = self.audit.query(&AuditFilter {
            status: Some(RunStatus::Started),
            before: Some(cutoff),
            ..AuditFilter::default()
        })?;
        for run in &stale {
            warn!(run_id = %run.id, phase = %run.phase, "Recovering interrupted review run");
            self.audit.update(
                &run.id,
                &AuditPatch {
                    status: Some(RunStatus::Failed),
                    error_message: Some(Some(INTERRUPTED_MESSAGE.to_string())),
                    ..AuditPatch::default()
                },
            )?;
        }
        Ok(stale.len())
    }
}
