use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SellReason {
    ProfitTarget,
    RiskManagement,
    MomentumLoss,
    Resistance,
}

impl fmt::Display for SellReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SellReason::ProfitTarget => write!(f, "profit_target"),
            SellReason::RiskManagement => write!(f, "risk_management"),
            SellReason::MomentumLoss => write!(f, "momentum_loss"),
            SellReason::Resistance => write!(f, "resistance"),
        }
    }
}

impl FromStr for SellReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "profit_target" => Ok(SellReason::ProfitTarget),
            "risk_management" => Ok(SellReason::RiskManagement),
            "momentum_loss" => Ok(SellReason::MomentumLoss),
            "resistance" => Ok(SellReason::Resistance),
            _ => Err(format!("Unknown sell reason: {s}")),
        }
    }
}
