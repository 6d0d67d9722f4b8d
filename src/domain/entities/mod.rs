pub mod discovery_recommendation;
pub mod portfolio_recommendation;
pub mod position;
pub mod review_run;
pub mod user_account;
