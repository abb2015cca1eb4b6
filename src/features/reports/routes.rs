use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::features::reports::handlers;
use crate::features::reports::services::ReportService;

/// Protected report routes (auth middleware applied by caller)
pub fn routes(service: Arc<ReportService>) -> Router {
    Router::new()
        .route(
            "/api/reports",
            get(handlers::list_reports).post(handlers::create_report),
        )
        .route("/api/reports/photos", post(handlers::upload_photo))
        .route("/api/reports/{id}", get(handlers::get_report))
        .with_state(service)
}

/// Public report routes
pub fn public_routes(service: Arc<ReportService>) -> Router {
    Router::new()
        .route("/api/stats", get(handlers::get_stats))
        .with_state(service)
}
