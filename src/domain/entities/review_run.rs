use crate::domain::values::review::{ReviewPhase, ReviewType, RunStatus};
use crate::domain::values::run_metadata::RunMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative counters of a review run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub coins_analyzed: u32,
    pub buy_candidates: u32,
    pub sell_candidates: u32,
    pub buy_count: u32,
    pub sell_count: u32,
    pub skipped_buy: u32,
    pub skipped_sell: u32,
    pub ai_rejected_buy: u32,
    pub ai_rejected_sell: u32,
    pub tier_denied: u32,
}

impl RunCounts {
    pub fn skipped_count(&self) -> u32 {
        self.skipped_buy + self.skipped_sell
    }

    /// Every scanned candidate ends up accepted, skipped or AI-rejected.
    pub fn is_balanced(&self) -> bool {
        self.buy_count + self.skipped_buy + self.ai_rejected_buy == self.buy_candidates
            && self.sell_count + self.skipped_sell + self.ai_rejected_sell == self.sell_candidates
    }
}

/// One review run as recorded in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRun {
    pub id: String,
    pub review_type: ReviewType,
    pub status: RunStatus,
    pub phase: ReviewPhase,
    pub coins_analyzed: u32,
    pub buy_count: u32,
    pub sell_count: u32,
    pub skipped_count: u32,
    pub error_message: Option<String>,
    pub metadata: RunMetadata,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ReviewRun {
    /// A freshly started run, positioned at the first phase.
    pub fn start(review_type: ReviewType, metadata: RunMetadata) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            review_type,
            status: RunStatus::Started,
            phase: ReviewPhase::Discovery,
            coins_analyzed: 0,
            buy_count: 0,
            sell_count: 0,
            skipped_count: 0,
            error_message: None,
            metadata,
            duration_ms: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RunStatus::Started
    }
}
