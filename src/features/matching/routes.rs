use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::features::matching::handlers;
use crate::features::matching::services::MatchService;

/// Create routes for the matching feature (auth middleware applied by caller)
pub fn routes(service: Arc<MatchService>) -> Router {
    Router::new()
        .route("/api/matches/mine", get(handlers::list_my_matches))
        .route("/api/matches/run", post(handlers::run_matcher))
        .with_state(service)
}
