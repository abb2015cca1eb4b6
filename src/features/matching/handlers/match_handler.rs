use std::sync::Arc;

use axum::{extract::State, Json};

use crate::core::error::Result;
use crate::features::auth::guards::RequireAdmin;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::matching::dtos::{MatchRunResponseDto, MyMatchDto};
use crate::features::matching::services::MatchService;
use crate::shared::types::ApiResponse;

/// Matches involving any of the current user's reports, newest first
#[utoipa::path(
    get,
    path = "/api/matches/mine",
    responses(
        (status = 200, description = "Matches", body = ApiResponse<Vec<MyMatchDto>>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "matches"
)]
pub async fn list_my_matches(
    user: AuthenticatedUser,
    State(service): State<Arc<MatchService>>,
) -> Result<Json<ApiResponse<Vec<MyMatchDto>>>> {
    let matches = service.list_for_user(&user.user_id).await?;
    let dtos = matches.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::ok(dtos)))
}

/// Run the matcher now instead of waiting for the next tick
#[utoipa::path(
    post,
    path = "/api/matches/run",
    responses(
        (status = 200, description = "Matcher run finished or joined", body = ApiResponse<MatchRunResponseDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin access required")
    ),
    security(("bearer_auth" = [])),
    tag = "matches"
)]
pub async fn run_matcher(
    RequireAdmin(admin): RequireAdmin,
    State(service): State<Arc<MatchService>>,
) -> Result<Json<ApiResponse<MatchRunResponseDto>>> {
    tracing::info!("Matcher run requested by {}", admin.user_id);
    let summary = service.run().await?;

    let message = match &summary {
        Some(_) => "Matcher run finished",
        None => "Matcher run already in progress",
    };

    Ok(Json(ApiResponse::success(
        Some(MatchRunResponseDto {
            started: summary.is_some(),
            summary,
        }),
        Some(message.to_string()),
        None,
    )))
}
