use std::sync::Arc;

use axum::{
    routing::{get, patch},
    Router,
};

use crate::features::notifications::handlers;
use crate::features::notifications::services::NotificationService;

/// Create routes for the notifications feature (auth middleware applied by caller)
pub fn routes(service: Arc<NotificationService>) -> Router {
    Router::new()
        .route("/api/notifications", get(handlers::list_notifications))
        .route("/api/notifications/unread-count", get(handlers::unread_count))
        .route("/api/notifications/read-all", patch(handlers::mark_all_read))
        .route("/api/notifications/stream", get(handlers::stream))
        .route(
            "/api/notifications/{id}",
            axum::routing::delete(handlers::delete_notification),
        )
        .route("/api/notifications/{id}/read", patch(handlers::mark_read))
        .route("/api/notifications/{id}/unread", patch(handlers::mark_unread))
        .with_state(service)
}
