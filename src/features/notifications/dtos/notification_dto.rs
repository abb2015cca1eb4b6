use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::features::notifications::models::{
    Notification, NotificationFilter, NotificationKind, NotificationStatus,
};
use crate::features::notifications::services::UnreadSnapshot;

/// Response DTO for notification
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponseDto {
    pub id: Uuid,
    pub message: String,
    pub kind: NotificationKind,
    pub status: NotificationStatus,
    pub related_report_id: Option<Uuid>,
    pub action: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl From<Notification> for NotificationResponseDto {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            message: n.message,
            kind: n.kind,
            status: n.status,
            related_report_id: n.related_report_id,
            action: n.action,
            created_at: n.created_at,
            read_at: n.read_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct NotificationListQuery {
    /// `all` (default) or `unread`
    #[serde(default)]
    pub filter: NotificationFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountDto {
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadResponseDto {
    pub updated: u64,
}

/// Payload of each realtime stream event
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnreadSnapshotDto {
    pub unread_count: i64,
    pub notifications: Vec<NotificationResponseDto>,
}

impl From<UnreadSnapshot> for UnreadSnapshotDto {
    fn from(s: UnreadSnapshot) -> Self {
        Self {
            unread_count: s.unread_count,
            notifications: s.notifications.into_iter().map(Into::into).collect(),
        }
    }
}
