mod match_service;

pub use match_service::{MatchRunSummary, MatchService};
