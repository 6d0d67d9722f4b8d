pub mod ai;
pub mod http;
pub mod market;
pub mod sqlite;
