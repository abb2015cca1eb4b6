pub mod auth;
pub mod matching;
pub mod notifications;
pub mod recoveries;
pub mod reports;
pub mod transactions;
