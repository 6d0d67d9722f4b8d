pub mod accounts;
pub mod assessor;
pub mod audit;
pub mod discovery;
pub mod orchestrator;
pub mod portfolio;
pub mod recommendations;
pub mod retry;
pub mod scheduler;
pub mod signals;
pub mod tier_gate;
