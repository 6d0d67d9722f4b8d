pub mod confidence;
pub mod market_conditions;
pub mod review;
pub mod risk_level;
pub mod run_metadata;
pub mod sell_reason;
pub mod strategy;
pub mod tier;
