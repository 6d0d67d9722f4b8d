//! Subscription tier gate for portfolio work.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::domain::error::DomainError;
use crate::domain::ports::usage_ledger::UsageLedger;
use crate::domain::values::tier::{UserTier, UserTierInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestedWork {
    /// Periodic portfolio monitoring driven by the scheduler.
    ScheduledMonitoring,
    /// A review the user asked for explicitly.
    OnDemand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    MonitoringDisabled,
    QuotaExhausted { limit: u32 },
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::MonitoringDisabled => write!(f, "portfolio monitoring not enabled"),
            DenyReason::QuotaExhausted { limit } => {
                write!(f, "on-demand limit of {limit} reached for this window")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TierDecision {
    Allow,
    Deny(DenyReason),
}

impl TierDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, TierDecision::Allow)
    }
}

/// Enforces per-user on-demand quotas over a sliding window and the
/// monitoring capability for scheduled work. Usage lives in the ledger,
/// so every process sharing it sees the same quota.
pub struct TierGate {
    window: Duration,
    ledger: Arc<dyn UsageLedger>,
}

impl TierGate {
    pub fn new(window: Duration, ledger: Arc<dyn UsageLedger>) -> Self {
        Self { window, ledger }
    }

    /// Decide whether `user_id` may have `work` done now. An allowed
    /// on-demand request consumes one unit of the user's quota.
    pub fn authorize(
        &self,
        user_id: &str,
        info: &UserTierInfo,
        work: RequestedWork,
        now: DateTime<Utc>,
    ) -> Result<TierDecision, DomainError> {
        match work {
            RequestedWork::ScheduledMonitoring => Ok(if info.portfolio_monitoring {
                TierDecision::Allow
            } else {
                TierDecision::Deny(DenyReason::MonitoringDisabled)
            }),
            RequestedWork::OnDemand => {
                if info.tier == UserTier::Premium {
                    return Ok(TierDecision::Allow);
                }
                let limit = info.on_demand_limit;
                if self.ledger.try_consume(user_id, limit, now - self.window, now)? {
                    Ok(TierDecision::Allow)
                } else {
                    Ok(TierDecision::Deny(DenyReason::QuotaExhausted { limit }))
                }
            }
        }
    }

    /// Remaining on-demand requests in the current window. `None` means unlimited.
    pub fn remaining(
        &self,
        user_id: &str,
        info: &UserTierInfo,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>, DomainError> {
        if info.tier == UserTier::Premium {
            return Ok(None);
        }
        let used = self.ledger.used_since(user_id, now - self.window)?;
        Ok(Some(info.on_demand_limit.saturating_sub(used)))
    }
}
