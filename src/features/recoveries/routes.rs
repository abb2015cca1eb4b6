use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::features::recoveries::handlers;
use crate::features::recoveries::services::RecoveryService;

/// Create routes for the recovery workflow (auth middleware applied by caller)
pub fn routes(service: Arc<RecoveryService>) -> Router {
    Router::new()
        .route("/api/matches/{report_id}", get(handlers::get_recovery_status))
        .route("/api/matches/{report_id}/confirm", post(handlers::confirm_ownership))
        .route("/api/matches/{report_id}/payment", post(handlers::complete_payment))
        .route("/api/matches/{report_id}/reward", post(handlers::claim_reward))
        .with_state(service)
}
