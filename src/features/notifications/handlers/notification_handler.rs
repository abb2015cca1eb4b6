use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::{sse::Event, sse::KeepAlive, IntoResponse, Response, Sse},
    Json,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::notifications::dtos::{
    MarkAllReadResponseDto, NotificationListQuery, NotificationResponseDto, UnreadCountDto,
    UnreadSnapshotDto,
};
use crate::features::notifications::services::NotificationService;
use crate::modules::store::Subscription;
use crate::shared::types::{ApiResponse, PaginationQuery};

/// List the current user's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationListQuery, PaginationQuery),
    responses(
        (status = 200, description = "Notifications", body = ApiResponse<Vec<NotificationResponseDto>>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn list_notifications(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
    Query(query): Query<NotificationListQuery>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<NotificationResponseDto>>>> {
    let notifications = service.list(&user.user_id, query.filter, &page).await?;
    let dtos = notifications.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::ok(dtos)))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    responses(
        (status = 200, description = "Unread notification count", body = ApiResponse<UnreadCountDto>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn unread_count(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
) -> Result<Json<ApiResponse<UnreadCountDto>>> {
    let unread_count = service.unread_count(&user.user_id).await?;
    Ok(Json(ApiResponse::ok(UnreadCountDto { unread_count })))
}

#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked read", body = ApiResponse<NotificationResponseDto>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn mark_read(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<NotificationResponseDto>>> {
    let notification = service.mark_read(&user.user_id, id).await?;
    Ok(Json(ApiResponse::ok(notification.into())))
}

#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/unread",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked unread", body = ApiResponse<NotificationResponseDto>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn mark_unread(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<NotificationResponseDto>>> {
    let notification = service.mark_unread(&user.user_id, id).await?;
    Ok(Json(ApiResponse::ok(notification.into())))
}

#[utoipa::path(
    patch,
    path = "/api/notifications/read-all",
    responses(
        (status = 200, description = "All notifications marked read", body = ApiResponse<MarkAllReadResponseDto>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn mark_all_read(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
) -> Result<Json<ApiResponse<MarkAllReadResponseDto>>> {
    let updated = service.mark_all_read(&user.user_id).await?;
    Ok(Json(ApiResponse::ok(MarkAllReadResponseDto { updated })))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn delete_notification(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete(&user.user_id, id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Notification deleted".to_string()),
        None,
    )))
}

/// Realtime unread notifications.
///
/// Sends a `snapshot` event on connect and again after every change to the
/// user's notifications.
#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    responses(
        (status = 200, description = "SSE stream of unread snapshots", content_type = "text/event-stream", body = UnreadSnapshotDto),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn stream(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
) -> Result<Response> {
    // Subscribe before the first fetch so no change slips between the two
    let mut subscription = service.subscribe();
    let initial = service.unread_snapshot(&user.user_id).await?;

    let (tx, rx) = mpsc::channel::<UnreadSnapshotDto>(16);
    if tx.send(initial.into()).await.is_err() {
        return Ok(().into_response());
    }

    tokio::spawn(forward_snapshots(service, subscription, user.user_id, tx));

    let stream = ReceiverStream::new(rx).map(|snapshot| {
        let event = Event::default()
            .event("snapshot")
            .json_data(&snapshot)
            .unwrap_or_else(|_| Event::default().event("error"));
        Ok::<_, Infallible>(event)
    });

    let sse = Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    );

    Ok(sse.into_response())
}

/// Push a fresh unread snapshot to `tx` after each change to the user's
/// notifications. Ends when the client disconnects or the feed closes.
async fn forward_snapshots(
    service: Arc<NotificationService>,
    mut subscription: Subscription,
    user_id: String,
    tx: mpsc::Sender<UnreadSnapshotDto>,
) {
    loop {
        let event = tokio::select! {
            event = subscription.next() => match event {
                Some(event) => event,
                None => break,
            },
            _ = tx.closed() => {
                tracing::debug!("Notification stream for {} closed", user_id);
                break;
            }
        };

        if event.user_id.as_deref() != Some(user_id.as_str()) {
            continue;
        }

        let snapshot = match service.unread_snapshot(&user_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("Failed to refresh notifications for {}: {:?}", user_id, e);
                continue;
            }
        };

        if tx.send(snapshot.into()).await.is_err() {
            tracing::debug!("Notification stream for {} closed", user_id);
            break;
        }
    }
}
