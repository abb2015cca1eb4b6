use std::sync::Arc;

use axum::{extract::State, Json};

use crate::core::error::Result;
use crate::features::auth::guards::RequireAdmin;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::matching::MatchService;
use crate::features::transactions::dtos::{RepairResponseDto, TransactionResponseDto};
use crate::features::transactions::services::TransactionService;
use crate::shared::types::ApiResponse;

#[derive(Clone)]
pub struct TransactionState {
    pub transactions: Arc<TransactionService>,
    pub matches: Arc<MatchService>,
}

/// List the current user's recovery fees and rewards, newest first
#[utoipa::path(
    get,
    path = "/api/transactions",
    responses(
        (status = 200, description = "Transactions", body = ApiResponse<Vec<TransactionResponseDto>>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "transactions"
)]
pub async fn list_transactions(
    user: AuthenticatedUser,
    State(state): State<TransactionState>,
) -> Result<Json<ApiResponse<Vec<TransactionResponseDto>>>> {
    let transactions = state.transactions.list_mine(&user.user_id).await?;
    let dtos = transactions.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::ok(dtos)))
}

/// Resume every match whose setup stopped part way, creating missing transactions
#[utoipa::path(
    post,
    path = "/api/transactions/repair",
    responses(
        (status = 200, description = "Repair finished", body = ApiResponse<RepairResponseDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "transactions"
)]
pub async fn repair_transactions(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<TransactionState>,
) -> Result<Json<ApiResponse<RepairResponseDto>>> {
    tracing::info!("Transaction repair requested by {}", admin.user_id);
    let settled = state.matches.repair().await?;
    Ok(Json(ApiResponse::ok(RepairResponseDto { settled })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MatchingConfig;
    use crate::features::notifications::NotificationService;
    use crate::features::reports::models::{CreateReport, CreateReportDocument, ReportKind};
    use crate::features::transactions::routes::routes;
    use crate::modules::store::{InMemoryStore, RecordStore};
    use crate::shared::test_helpers::{test_admin, test_cache, test_user, with_user};
    use axum_test::TestServer;
    use serde_json::Value;

    fn state(store: Arc<InMemoryStore>) -> TransactionState {
        let cache = test_cache();
        let config = MatchingConfig::default();
        let transactions = Arc::new(TransactionService::new(store.clone(), config.clone()));
        let notifications = Arc::new(NotificationService::new(store.clone(), cache.clone()));
        let matches = Arc::new(MatchService::new(
            store,
            transactions.clone(),
            notifications,
            cache,
            config,
        ));
        TransactionState {
            transactions,
            matches,
        }
    }

    async fn file(store: &InMemoryStore, owner: &str, kind: ReportKind) {
        store
            .insert_report(
                &CreateReport {
                    owner_user_id: owner.to_string(),
                    kind,
                    recovery_fee: None,
                    reward_amount: None,
                    collection_point: Some("Nakuru Police Station".to_string()),
                    description: None,
                    location: None,
                },
                &[CreateReportDocument {
                    document_type: "passport".to_string(),
                    document_number: "AK0099887".to_string(),
                    photo_key: None,
                }],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_repair_creates_missing_transactions() {
        let store = Arc::new(InMemoryStore::new());
        let state = state(store.clone());
        file(&store, "owner", ReportKind::Lost).await;
        file(&store, "finder", ReportKind::Found).await;

        store.fail_next_transaction_inserts(1);
        state.matches.run().await.unwrap();
        assert!(store.all_transactions().await.is_empty());

        let server = TestServer::new(with_user(routes(state.clone()), test_admin())).unwrap();
        let response = server.post("/api/transactions/repair").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["settled"], 1);
        assert_eq!(store.all_transactions().await.len(), 2);

        let owner_server = TestServer::new(with_user(routes(state), test_user("owner"))).unwrap();
        let body: Value = owner_server.get("/api/transactions").await.json();
        let mine = body["data"].as_array().unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0]["kind"], "recovery");
        assert_eq!(mine[0]["status"], "pending");
    }

    #[tokio::test]
    async fn test_repair_requires_admin() {
        let store = Arc::new(InMemoryStore::new());
        let app = with_user(routes(state(store)), test_user("someone"));
        let server = TestServer::new(app).unwrap();

        server
            .post("/api/transactions/repair")
            .await
            .assert_status_forbidden();
    }
}
