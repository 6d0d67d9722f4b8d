use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::market_conditions::MarketConditions;

/// Structured metadata attached to a review run.
///
/// Known keys are named fields; anything else goes in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buy_candidates: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_candidates: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_buy: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_sell: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_rejected_buy: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_rejected_sell: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_denied: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strategies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_conditions: Option<MarketConditions>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}
