use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::auth;
use crate::features::matching::{
    dtos as matching_dtos, handlers as matching_handlers, models as matching_models,
    services::MatchRunSummary,
};
use crate::features::notifications::{
    dtos as notifications_dtos, handlers as notifications_handlers,
    models as notifications_models,
};
use crate::features::recoveries::{dtos as recoveries_dtos, handlers as recoveries_handlers};
use crate::features::reports::{
    dtos as reports_dtos, handlers as reports_handlers, models as reports_models,
};
use crate::features::transactions::{
    dtos as transactions_dtos, handlers as transactions_handlers, models as transactions_models,
};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Auth
        auth::handler::get_me,
        // Reports
        reports_handlers::create_report,
        reports_handlers::list_reports,
        reports_handlers::get_report,
        reports_handlers::upload_photo,
        reports_handlers::get_stats,
        // Matches
        matching_handlers::list_my_matches,
        matching_handlers::run_matcher,
        // Recoveries
        recoveries_handlers::get_recovery_status,
        recoveries_handlers::confirm_ownership,
        recoveries_handlers::complete_payment,
        recoveries_handlers::claim_reward,
        // Transactions
        transactions_handlers::list_transactions,
        transactions_handlers::repair_transactions,
        // Notifications
        notifications_handlers::list_notifications,
        notifications_handlers::unread_count,
        notifications_handlers::mark_read,
        notifications_handlers::mark_unread,
        notifications_handlers::mark_all_read,
        notifications_handlers::delete_notification,
        notifications_handlers::stream,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Auth
            auth::dto::MeResponseDto,
            auth::model::AuthenticatedUser,
            ApiResponse<auth::dto::MeResponseDto>,
            // Reports
            reports_models::ReportKind,
            reports_models::ReportStatus,
            reports_models::ReportStats,
            reports_dtos::CreateReportDto,
            reports_dtos::DocumentDto,
            reports_dtos::DocumentResponseDto,
            reports_dtos::ReportResponseDto,
            reports_dtos::PhotoUploadDto,
            reports_dtos::PhotoUploadResponseDto,
            ApiResponse<reports_dtos::ReportResponseDto>,
            ApiResponse<Vec<reports_dtos::ReportResponseDto>>,
            ApiResponse<reports_dtos::PhotoUploadResponseDto>,
            ApiResponse<reports_models::ReportStats>,
            // Matches
            matching_models::MatchLinkStatus,
            matching_dtos::MatchLinkDto,
            matching_dtos::MyMatchDto,
            matching_dtos::MatchRunResponseDto,
            MatchRunSummary,
            ApiResponse<Vec<matching_dtos::MyMatchDto>>,
            ApiResponse<matching_dtos::MatchLinkDto>,
            ApiResponse<matching_dtos::MatchRunResponseDto>,
            // Recoveries
            recoveries_dtos::PaymentRequestDto,
            recoveries_dtos::CollectionPointDto,
            recoveries_dtos::RecoverySideDto,
            recoveries_dtos::RecoveryStatusDto,
            ApiResponse<recoveries_dtos::CollectionPointDto>,
            ApiResponse<recoveries_dtos::RecoveryStatusDto>,
            // Transactions
            transactions_models::TransactionKind,
            transactions_models::TransactionStatus,
            transactions_dtos::TransactionResponseDto,
            transactions_dtos::RepairResponseDto,
            ApiResponse<transactions_dtos::TransactionResponseDto>,
            ApiResponse<Vec<transactions_dtos::TransactionResponseDto>>,
            ApiResponse<transactions_dtos::RepairResponseDto>,
            // Notifications
            notifications_models::NotificationKind,
            notifications_models::NotificationStatus,
            notifications_dtos::NotificationResponseDto,
            notifications_dtos::UnreadCountDto,
            notifications_dtos::MarkAllReadResponseDto,
            notifications_dtos::UnreadSnapshotDto,
            ApiResponse<notifications_dtos::NotificationResponseDto>,
            ApiResponse<Vec<notifications_dtos::NotificationResponseDto>>,
            ApiResponse<notifications_dtos::UnreadCountDto>,
            ApiResponse<notifications_dtos::MarkAllReadResponseDto>,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Current user"),
        (name = "reports", description = "Lost and found document reports"),
        (name = "matches", description = "Matches between lost and found reports"),
        (name = "recoveries", description = "Verification, payment and reward claims"),
        (name = "transactions", description = "Recovery fees and finder rewards"),
        (name = "notifications", description = "User notifications"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

/// Title, version and description from configuration
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
