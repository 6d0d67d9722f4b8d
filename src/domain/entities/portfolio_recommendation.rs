use crate::domain::values::confidence::Confidence;
use crate::domain::values::risk_level::RiskLevel;
use crate::domain::values::sell_reason::SellReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user-scoped sell signal against an open position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRecommendation {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub confidence: Confidence,
    pub current_price: f64,
    pub entry_price: f64,
    pub quantity: f64,
    pub unrealized_pnl: f64,
    pub percent_gain: f64,
    pub sell_reason: SellReason,
    pub risk_level: RiskLevel,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// `(unrealized_pnl, percent_gain)` for a position marked at `current_price`.
pub fn position_pnl(entry_price: f64, current_price: f64, quantity: f64) -> (f64, f64) {
    let unrealized = (current_price - entry_price) * quantity;
    let cost = entry_price * quantity;
    let pct = if cost.abs() > f64::EPSILON {
        unrealized / cost * 100.0
    } else {
        0.0
    };
    (unrealized, pct)
}
