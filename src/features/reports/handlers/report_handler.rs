use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::core::extractor::ValidJson;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::reports::dtos::{
    CreateReportDto, PhotoUploadDto, PhotoUploadResponseDto, ReportResponseDto,
};
use crate::features::reports::models::ReportStats;
use crate::features::reports::services::ReportService;
use crate::shared::types::ApiResponse;

/// File a lost or found report
#[utoipa::path(
    post,
    path = "/api/reports",
    request_body = CreateReportDto,
    responses(
        (status = 201, description = "Report filed", body = ApiResponse<ReportResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn create_report(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    ValidJson(dto): ValidJson<CreateReportDto>,
) -> Result<(StatusCode, Json<ApiResponse<ReportResponseDto>>)> {
    let report = service.create(&user, dto).await?;
    let dto = service.to_response(report).await;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(dto),
            Some("Report filed".to_string()),
            None,
        )),
    ))
}

/// List reports for the authenticated user
#[utoipa::path(
    get,
    path = "/api/reports",
    responses(
        (status = 200, description = "List of user's reports", body = ApiResponse<Vec<ReportResponseDto>>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn list_reports(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
) -> Result<Json<ApiResponse<Vec<ReportResponseDto>>>> {
    let reports = service.list_mine(&user.user_id).await?;
    let mut dtos = Vec::with_capacity(reports.len());
    for report in reports {
        dtos.push(service.to_response(report).await);
    }
    Ok(Json(ApiResponse::ok(dtos)))
}

#[utoipa::path(
    get,
    path = "/api/reports/{id}",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report found", body = ApiResponse<ReportResponseDto>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not your report"),
        (status = 404, description = "Report not found")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn get_report(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReportResponseDto>>> {
    let report = service.get(&user, id).await?;
    Ok(Json(ApiResponse::ok(service.to_response(report).await)))
}

/// Upload a document photo
///
/// Accepts multipart/form-data with a single `file` field.
#[utoipa::path(
    post,
    path = "/api/reports/photos",
    request_body(content = PhotoUploadDto, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Photo stored", body = ApiResponse<PhotoUploadResponseDto>),
        (status = 400, description = "Missing, oversized or unsupported file"),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "File storage unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn upload_photo(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<PhotoUploadResponseDto>>)> {
    let mut upload: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        if field.name() != Some("file") {
            tracing::debug!("Ignoring unknown field: {:?}", field.name());
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file data: {}", e)))?;
        upload = Some((data.to_vec(), content_type));
    }

    let (data, content_type) =
        upload.ok_or_else(|| AppError::BadRequest("File is required".to_string()))?;
    let photo_key = service.upload_photo(&user, data, &content_type).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(PhotoUploadResponseDto { photo_key })),
    ))
}

/// Public report counts
#[utoipa::path(
    get,
    path = "/api/stats",
    responses(
        (status = 200, description = "Report counts", body = ApiResponse<ReportStats>)
    ),
    tag = "reports"
)]
pub async fn get_stats(
    State(service): State<Arc<ReportService>>,
) -> Result<Json<ApiResponse<ReportStats>>> {
    Ok(Json(ApiResponse::ok(service.stats().await?)))
}

#[cfg(test)]
mod tests {
    use crate::features::reports::routes::{public_routes, routes};
    use crate::features::reports::services::ReportService;
    use crate::modules::store::InMemoryStore;
    use crate::shared::test_helpers::{test_cache, test_user, with_user};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    fn service() -> Arc<ReportService> {
        Arc::new(ReportService::new(
            Arc::new(InMemoryStore::new()),
            test_cache(),
            None,
            Duration::from_secs(60),
        ))
    }

    #[tokio::test]
    async fn test_file_and_list_report() {
        let service = service();
        let app = with_user(routes(service.clone()), test_user("wanjiru"))
            .merge(public_routes(service));
        let server = TestServer::new(app).unwrap();

        let response = server
            .post("/api/reports")
            .json(&json!({
                "kind": "found",
                "documents": [{ "document_type": "national_id", "document_number": "22334455" }],
                "collection_point": "Eldoret Police Station"
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], "active");
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let body: Value = server.get("/api/reports").await.json();
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let body: Value = server.get(&format!("/api/reports/{}", id)).await.json();
        assert_eq!(body["data"]["documents"][0]["document_number"], "22334455");

        let body: Value = server.get("/api/stats").await.json();
        assert_eq!(body["data"]["found_reports"], 1);
    }

    #[tokio::test]
    async fn test_found_report_without_collection_point_is_rejected() {
        let server = TestServer::new(with_user(routes(service()), test_user("wanjiru"))).unwrap();

        server
            .post("/api/reports")
            .json(&json!({
                "kind": "found",
                "documents": [{ "document_type": "passport", "document_number": "AK0099887" }]
            }))
            .await
            .assert_status_bad_request();
    }
}
