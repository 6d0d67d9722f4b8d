use crate::domain::values::confidence::Confidence;
use crate::domain::values::risk_level::RiskLevel;
use crate::domain::values::strategy::{CoinUniverse, Strategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A global buy signal. Not scoped to any user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryRecommendation {
    pub id: String,
    pub symbol: String,
    pub strategy: Strategy,
    pub coin_universe: CoinUniverse,
    pub confidence: Confidence,
    pub entry_price: f64,
    pub stop_loss: f64,
    /// `[first target, stretch target]`.
    pub take_profit_levels: [f64; 2],
    /// Suggested size as percent of portfolio.
    pub position_size_pct: f64,
    pub risk_level: RiskLevel,
    pub reasoning: String,
    pub sources: Vec<String>,
    pub discovery_score: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DiscoveryRecommendation {
    /// Long-only price geometry: stop < entry < first target <= stretch target,
    /// and the recommendation expires after it was created.
    pub fn is_well_formed(&self) -> bool {
        self.stop_loss < self.entry_price
            && self.entry_price < self.take_profit_levels[0]
            && self.take_profit_levels[0] <= self.take_profit_levels[1]
            && self.expires_at > self.created_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
