use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::extractor::ValidJson;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::matching::dtos::MatchLinkDto;
use crate::features::recoveries::dtos::{
    CollectionPointDto, PaymentRequestDto, RecoveryStatusDto,
};
use crate::features::recoveries::services::RecoveryService;
use crate::features::transactions::dtos::TransactionResponseDto;
use crate::shared::types::ApiResponse;

/// Match state for one of the caller's reports
#[utoipa::path(
    get,
    path = "/api/matches/{report_id}",
    params(("report_id" = Uuid, Path, description = "Lost or found report ID")),
    responses(
        (status = 200, description = "Match state", body = ApiResponse<RecoveryStatusDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a party to this match"),
        (status = 404, description = "No matching record")
    ),
    security(("bearer_auth" = [])),
    tag = "recoveries"
)]
pub async fn get_recovery_status(
    user: AuthenticatedUser,
    State(service): State<Arc<RecoveryService>>,
    Path(report_id): Path<Uuid>,
) -> Result<Json<ApiResponse<RecoveryStatusDto>>> {
    let status = service.get_status(&user, report_id).await?;
    Ok(Json(ApiResponse::ok(status.into())))
}

/// The owner confirms the found document is theirs
#[utoipa::path(
    post,
    path = "/api/matches/{report_id}/confirm",
    params(("report_id" = Uuid, Path, description = "Lost or found report ID")),
    responses(
        (status = 200, description = "Ownership confirmed", body = ApiResponse<MatchLinkDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner of the lost report"),
        (status = 404, description = "No matching record"),
        (status = 409, description = "Match is not awaiting confirmation")
    ),
    security(("bearer_auth" = [])),
    tag = "recoveries"
)]
pub async fn confirm_ownership(
    user: AuthenticatedUser,
    State(service): State<Arc<RecoveryService>>,
    Path(report_id): Path<Uuid>,
) -> Result<Json<ApiResponse<MatchLinkDto>>> {
    let link = service.confirm_ownership(&user, report_id).await?;
    Ok(Json(ApiResponse::ok(link.into())))
}

/// Pay the recovery fee and learn the collection point
#[utoipa::path(
    post,
    path = "/api/matches/{report_id}/payment",
    params(("report_id" = Uuid, Path, description = "Lost or found report ID")),
    request_body = PaymentRequestDto,
    responses(
        (status = 200, description = "Payment recorded", body = ApiResponse<CollectionPointDto>),
        (status = 400, description = "Invalid payment details"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner of the lost report"),
        (status = 404, description = "No matching record"),
        (status = 409, description = "Match is not awaiting payment")
    ),
    security(("bearer_auth" = [])),
    tag = "recoveries"
)]
pub async fn complete_payment(
    user: AuthenticatedUser,
    State(service): State<Arc<RecoveryService>>,
    Path(report_id): Path<Uuid>,
    ValidJson(dto): ValidJson<PaymentRequestDto>,
) -> Result<Json<ApiResponse<CollectionPointDto>>> {
    let collection_point = service
        .complete_payment(&user, report_id, dto.into())
        .await?;
    Ok(Json(ApiResponse::ok(CollectionPointDto { collection_point })))
}

/// The finder claims their reward
#[utoipa::path(
    post,
    path = "/api/matches/{report_id}/reward",
    params(("report_id" = Uuid, Path, description = "Lost or found report ID")),
    request_body = PaymentRequestDto,
    responses(
        (status = 200, description = "Reward claimed", body = ApiResponse<TransactionResponseDto>),
        (status = 400, description = "Invalid payout details"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner of the found report"),
        (status = 404, description = "No matching record"),
        (status = 409, description = "Reward not available or already claimed")
    ),
    security(("bearer_auth" = [])),
    tag = "recoveries"
)]
pub async fn claim_reward(
    user: AuthenticatedUser,
    State(service): State<Arc<RecoveryService>>,
    Path(report_id): Path<Uuid>,
    ValidJson(dto): ValidJson<PaymentRequestDto>,
) -> Result<Json<ApiResponse<TransactionResponseDto>>> {
    let transaction = service.claim_reward(&user, report_id, dto.into()).await?;
    Ok(Json(ApiResponse::ok(transaction.into())))
}
