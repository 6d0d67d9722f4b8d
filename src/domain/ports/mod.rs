pub mod ai_provider;
pub mod audit_log;
pub mod market_data;
pub mod position_repository;
pub mod recommendation_store;
pub mod usage_ledger;
pub mod user_tier;
