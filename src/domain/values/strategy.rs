//! Discovery strategies and the coin universes they scan.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::risk_level::RiskLevel;

/// Long-only discovery strategy. Each strategy fixes its own acceptance
/// thresholds and trade geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Conservative,
    Moderate,
    Aggressive,
}

impl Strategy {
    /// Minimum post-AI confidence for a buy to be accepted.
    pub fn min_confidence(&self) -> f64 {
        match self {
            Strategy::Conservative => 0.75,
            Strategy::Moderate => 0.65,
            Strategy::Aggressive => 0.55,
        }
    }

    /// Highest risk level this strategy will recommend.
    pub fn max_risk(&self) -> RiskLevel {
        match self {
            Strategy::Conservative => RiskLevel::Low,
            Strategy::Moderate => RiskLevel::Medium,
            Strategy::Aggressive => RiskLevel::High,
        }
    }

    /// Stop-loss distance below entry, as a fraction.
    pub fn stop_loss_fraction(&self) -> f64 {
        match self {
            Strategy::Conservative => 0.05,
            Strategy::Moderate => 0.08,
            Strategy::Aggressive => 0.12,
        }
    }

    /// Maximum position size as percent of portfolio, scaled by confidence.
    pub fn max_position_pct(&self) -> f64 {
        match self {
            Strategy::Conservative => 2.0,
            Strategy::Moderate => 4.0,
            Strategy::Aggressive => 6.0,
        }
    }

    pub fn ttl_hours(&self) -> i64 {
        match self {
            Strategy::Conservative => 24,
            Strategy::Moderate => 12,
            Strategy::Aggressive => 6,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Conservative => write!(f, "conservative"),
            Strategy::Moderate => write!(f, "moderate"),
            Strategy::Aggressive => write!(f, "aggressive"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conservative" => Ok(Strategy::Conservative),
            "moderate" => Ok(Strategy::Moderate),
            "aggressive" => Ok(Strategy::Aggressive),
            _ => Err(format!("Unknown strategy: {s}")),
        }
    }
}

/// Candidate coin universe, by market-cap / volume rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinUniverse {
    Top10,
    Top25,
    Top50,
    Top100,
}

impl CoinUniverse {
    pub fn size(&self) -> usize {
        match self {
            CoinUniverse::Top10 => 10,
            CoinUniverse::Top25 => 25,
            CoinUniverse::Top50 => 50,
            CoinUniverse::Top100 => 100,
        }
    }
}

impl fmt::Display for CoinUniverse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinUniverse::Top10 => write!(f, "top10"),
            CoinUniverse::Top25 => write!(f, "top25"),
            CoinUniverse::Top50 => write!(f, "top50"),
            CoinUniverse::Top100 => write!(f, "top100"),
        }
    }
}

impl FromStr for CoinUniverse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top10" => Ok(CoinUniverse::Top10),
            "top25" => Ok(CoinUniverse::Top25),
            "top50" => Ok(CoinUniverse::Top50),
            "top100" => Ok(CoinUniverse::Top100),
            _ => Err(format!("Unknown coin universe: {s}")),
        }
    }
}
