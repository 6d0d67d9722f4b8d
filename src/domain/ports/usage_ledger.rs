use chrono::{DateTime, Utc};

use crate::domain::error::DomainError;

/// Durable record of on-demand review requests per user. Shared by every
/// process pointed at the same store, so quotas survive restarts.
pub trait UsageLedger: Send + Sync {
    /// Record one use at `at` if fewer than `limit` uses fall after `since`.
    /// Returns whether the use was recorded. Check and insert are atomic.
    fn try_consume(
        &self,
        user_id: &str,
        limit: u32,
        since: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool, DomainError>;

    fn used_since(&self, user_id: &str, since: DateTime<Utc>) -> Result<u32, DomainError>;
}
