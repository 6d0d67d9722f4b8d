use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    Free,
    Premium,
}

impl fmt::Display for UserTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserTier::Free => write!(f, "free"),
            UserTier::Premium => write!(f, "premium"),
        }
    }
}

impl FromStr for UserTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(UserTier::Free),
            "premium" => Ok(UserTier::Premium),
            _ => Err(format!("Unknown tier: {s}")),
        }
    }
}

/// Capabilities granted by a user's subscription. Owned by the billing side;
/// the review pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTierInfo {
    pub tier: UserTier,
    pub portfolio_monitoring: bool,
    pub on_demand_limit: u32,
    pub custom_alerts: bool,
}

impl UserTierInfo {
    pub const FREE_ON_DEMAND_LIMIT: u32 = 3;

    /// Default capabilities for a tier.
    pub fn for_tier(tier: UserTier) -> Self {
        match tier {
            UserTier::Free => Self {
                tier,
                portfolio_monitoring: false,
                on_demand_limit: Self::FREE_ON_DEMAND_LIMIT,
                custom_alerts: false,
            },
            UserTier::Premium => Self {
                tier,
                portfolio_monitoring: true,
                on_demand_limit: u32::MAX,
                custom_alerts: true,
            },
        }
    }
}
