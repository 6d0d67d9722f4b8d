//! Market condition snapshot used to tune review cadence and risk.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolatilityLevel::Low => write!(f, "low"),
            VolatilityLevel::Medium => write!(f, "medium"),
            VolatilityLevel::High => write!(f, "high"),
            VolatilityLevel::Extreme => write!(f, "extreme"),
        }
    }
}

impl FromStr for VolatilityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(VolatilityLevel::Low),
            "medium" => Ok(VolatilityLevel::Medium),
            "high" => Ok(VolatilityLevel::High),
            "extreme" => Ok(VolatilityLevel::Extreme),
            _ => Err(format!("Unknown volatility level: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Bull,
    Bear,
    Sideways,
    Volatile,
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRegime::Bull => write!(f, "bull"),
            MarketRegime::Bear => write!(f, "bear"),
            MarketRegime::Sideways => write!(f, "sideways"),
            MarketRegime::Volatile => write!(f, "volatile"),
        }
    }
}

impl FromStr for MarketRegime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bull" => Ok(MarketRegime::Bull),
            "bear" => Ok(MarketRegime::Bear),
            "sideways" => Ok(MarketRegime::Sideways),
            "volatile" => Ok(MarketRegime::Volatile),
            _ => Err(format!("Unknown market regime: {s}")),
        }
    }
}

/// A symbol with an outsized 24h move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopMover {
    pub symbol: String,
    pub change_pct: f64,
}

/// Raw, pre-classification market signals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSignals {
    /// Mean signed 24h price change across the universe, in percent.
    pub price_movement_pct: f64,
    /// Mean absolute 24h price change across the universe, in percent.
    pub abs_price_movement_pct: f64,
    /// Aggregate 24h volume change, in percent.
    pub volume_change_pct: f64,
    pub news_rate_per_hour: f64,
    pub btc_dominance_pct: f64,
    pub top_movers: Vec<TopMover>,
    pub significant_news: Vec<String>,
}

/// Classified market conditions for one review run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    pub volatility_level: VolatilityLevel,
    pub volume_change_pct: f64,
    pub price_movement_pct: f64,
    pub news_rate_per_hour: f64,
    pub btc_dominance_pct: f64,
    pub market_regime: MarketRegime,
    pub review_interval_minutes: u32,
    pub top_movers: Vec<TopMover>,
    pub significant_news: Vec<String>,
}
