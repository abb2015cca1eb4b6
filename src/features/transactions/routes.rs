use axum::{
    routing::{get, post},
    Router,
};

use crate::features::transactions::handlers::{self, TransactionState};

/// Create routes for the transactions feature (auth middleware applied by caller)
pub fn routes(state: TransactionState) -> Router {
    Router::new()
        .route("/api/transactions", get(handlers::list_transactions))
        .route("/api/transactions/repair", post(handlers::repair_transactions))
        .with_state(state)
}
