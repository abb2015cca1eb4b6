use std::sync::Arc;

use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::notifications::models::{
    CreateNotification, Notification, NotificationFilter, NotificationKind, NotificationStatus,
};
use crate::features::notifications::templates::{self, NotificationTemplate};
use crate::modules::store::{Collection, RecordStore, Subscription};
use crate::shared::cache::TtlCache;
use crate::shared::constants::cache_key_unread_count;
use crate::shared::types::PaginationQuery;

/// Optional attributes of a new notification
#[derive(Debug, Clone)]
pub struct NotificationOptions {
    pub kind: NotificationKind,
    pub related_report_id: Option<Uuid>,
    /// Client route to open from the notification
    pub action: Option<String>,
    /// Per-user idempotency key; a repeat with the same key is not stored twice
    pub dedupe_key: Option<String>,
}

impl NotificationOptions {
    pub fn new(kind: NotificationKind) -> Self {
        Self {
            kind,
            related_report_id: None,
            action: None,
            dedupe_key: None,
        }
    }

    pub fn report(mut self, report_id: Uuid) -> Self {
        self.related_report_id = Some(report_id);
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn dedupe(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }
}

/// Unread notifications plus their total, as pushed over the realtime stream
#[derive(Debug, Clone)]
pub struct UnreadSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

/// Service for notification dispatch and read-state bookkeeping
pub struct NotificationService {
    store: Arc<dyn RecordStore>,
    cache: Arc<TtlCache>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn RecordStore>, cache: Arc<TtlCache>) -> Self {
        Self { store, cache }
    }

    /// Persist a notification. Never fails the caller: errors are logged and yield `None`.
    pub async fn create_notification(
        &self,
        user_id: &str,
        message: &str,
        options: NotificationOptions,
    ) -> Option<Notification> {
        let data = CreateNotification {
            user_id: user_id.to_string(),
            message: message.to_string(),
            kind: options.kind,
            related_report_id: options.related_report_id,
            action: options.action,
            dedupe_key: options.dedupe_key,
        };

        match self.store.insert_notification(&data).await {
            Ok(notification) => {
                self.cache.invalidate(&cache_key_unread_count(user_id)).await;
                tracing::debug!(
                    "Notification {} stored for user {}",
                    notification.id,
                    user_id
                );
                Some(notification)
            }
            Err(e) => {
                tracing::error!("Failed to create notification for {}: {:?}", user_id, e);
                None
            }
        }
    }

    /// Render `template` and store the result; same error policy as `create_notification`
    pub async fn notify(
        &self,
        user_id: &str,
        template: NotificationTemplate,
        ctx: minijinja::Value,
        options: NotificationOptions,
    ) -> Option<Notification> {
        match templates::render(template, ctx) {
            Ok(message) => self.create_notification(user_id, &message, options).await,
            Err(e) => {
                tracing::error!(
                    "Failed to render notification {} for {}: {}",
                    template.name(),
                    user_id,
                    e
                );
                None
            }
        }
    }

    pub async fn list(
        &self,
        user_id: &str,
        filter: NotificationFilter,
        page: &PaginationQuery,
    ) -> Result<Vec<Notification>> {
        self.store.list_notifications(user_id, filter, page).await
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<i64> {
        let store = self.store.clone();
        self.cache
            .cached(
                &cache_key_unread_count(user_id),
                self.cache.default_ttl(),
                || async move {
                    store
                        .count_notifications(user_id, NotificationStatus::Unread)
                        .await
                },
            )
            .await
    }

    /// Already-read notifications are returned unchanged
    pub async fn mark_read(&self, user_id: &str, id: Uuid) -> Result<Notification> {
        self.transition(
            user_id,
            id,
            &[NotificationStatus::Unread],
            NotificationStatus::Read,
        )
        .await
    }

    pub async fn mark_unread(&self, user_id: &str, id: Uuid) -> Result<Notification> {
        self.transition(
            user_id,
            id,
            &[NotificationStatus::Read],
            NotificationStatus::Unread,
        )
        .await
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let updated = self
            .store
            .set_all_notification_status(
                user_id,
                NotificationStatus::Unread,
                NotificationStatus::Read,
            )
            .await?;

        if updated > 0 {
            self.cache.invalidate(&cache_key_unread_count(user_id)).await;
        }
        tracing::debug!("Marked {} notifications read for {}", updated, user_id);
        Ok(updated)
    }

    /// Soft delete; deleting twice is a no-op
    pub async fn delete(&self, user_id: &str, id: Uuid) -> Result<()> {
        let changed = self
            .store
            .set_notification_status(
                user_id,
                id,
                &[NotificationStatus::Unread, NotificationStatus::Read],
                NotificationStatus::Deleted,
            )
            .await?;

        match changed {
            Some(_) => {
                self.cache.invalidate(&cache_key_unread_count(user_id)).await;
                Ok(())
            }
            None => self.get_existing(user_id, id).await.map(|_| ()),
        }
    }

    pub async fn unread_snapshot(&self, user_id: &str) -> Result<UnreadSnapshot> {
        let notifications = self
            .store
            .list_notifications(
                user_id,
                NotificationFilter::Unread,
                &PaginationQuery::default(),
            )
            .await?;
        let unread_count = self.unread_count(user_id).await?;

        Ok(UnreadSnapshot {
            notifications,
            unread_count,
        })
    }

    pub fn subscribe(&self) -> Subscription {
        self.store.subscribe(Collection::Notifications)
    }

    async fn transition(
        &self,
        user_id: &str,
        id: Uuid,
        from: &[NotificationStatus],
        to: NotificationStatus,
    ) -> Result<Notification> {
        if let Some(notification) = self
            .store
            .set_notification_status(user_id, id, from, to)
            .await?
        {
            self.cache.invalidate(&cache_key_unread_count(user_id)).await;
            return Ok(notification);
        }

        let existing = self.get_existing(user_id, id).await?;
        if existing.status == NotificationStatus::Deleted {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(existing)
    }

    /// Notification owned by `user_id`, including deleted ones
    async fn get_existing(&self, user_id: &str, id: Uuid) -> Result<Notification> {
        self.store
            .get_notification(user_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::store::InMemoryStore;
    use std::time::Duration;
    use crate::shared::test_helpers::test_cache;

    fn service() -> (Arc<InMemoryStore>, NotificationService) {
        let store = Arc::new(InMemoryStore::new());
        let service = NotificationService::new(store.clone(), test_cache());
        (store, service)
    }

    async fn seed(service: &NotificationService, user: &str, message: &str) -> Notification {
        service
            .create_notification(user, message, NotificationOptions::new(NotificationKind::System))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let (_, service) = service();
        let n = seed(&service, "alice", "hello").await;
        let mut sub = service.subscribe();

        let first = service.mark_read("alice", n.id).await.unwrap();
        assert_eq!(first.status, NotificationStatus::Read);
        assert!(first.read_at.is_some());
        let event = sub.next().await.unwrap();
        assert_eq!(event.record_id, n.id);

        let second = service.mark_read("alice", n.id).await.unwrap();
        assert_eq!(second.status, NotificationStatus::Read);
        assert_eq!(second.read_at, first.read_at);

        // The repeat published nothing
        let repeat = tokio::time::timeout(Duration::from_millis(100), sub.next()).await;
        assert!(repeat.is_err(), "unexpected change event: {:?}", repeat);

        assert_eq!(service.unread_count("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unread_count_reflects_writes() {
        let (_, service) = service();
        let a = seed(&service, "alice", "one").await;
        seed(&service, "alice", "two").await;
        assert_eq!(service.unread_count("alice").await.unwrap(), 2);

        service.mark_read("alice", a.id).await.unwrap();
        assert_eq!(service.unread_count("alice").await.unwrap(), 1);

        service.mark_unread("alice", a.id).await.unwrap();
        assert_eq!(service.unread_count("alice").await.unwrap(), 2);

        assert_eq!(service.mark_all_read("alice").await.unwrap(), 2);
        assert_eq!(service.unread_count("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deleted_notifications_are_hidden() {
        let (_, service) = service();
        let n = seed(&service, "alice", "gone soon").await;
        seed(&service, "alice", "stays").await;

        service.delete("alice", n.id).await.unwrap();
        service.delete("alice", n.id).await.unwrap();

        let listed = service
            .list("alice", NotificationFilter::All, &PaginationQuery::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].message, "stays");

        let err = service.mark_read("alice", n.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_other_users_notifications_are_not_found() {
        let (_, service) = service();
        let n = seed(&service, "alice", "private").await;

        let err = service.mark_read("mallory", n.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = service.delete("mallory", n.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_dedupe_key_stores_once() {
        let (store, service) = service();
        let options = NotificationOptions::new(NotificationKind::Match).dedupe("match:1:lost");

        let first = service
            .create_notification("alice", "match", options.clone())
            .await
            .unwrap();
        let second = service
            .create_notification("alice", "match", options)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.notifications_for("alice").await.len(), 1);
    }

    #[tokio::test]
    async fn test_notify_renders_template() {
        let (_, service) = service();
        let n = service
            .notify(
                "bob",
                NotificationTemplate::RewardAvailable,
                minijinja::context! { amount => "100" },
                NotificationOptions::new(NotificationKind::Reward),
            )
            .await
            .unwrap();

        assert!(n.message.contains("KES 100"));
    }

    #[tokio::test]
    async fn test_unread_snapshot_lists_newest_first() {
        let (_, service) = service();
        seed(&service, "alice", "older").await;
        seed(&service, "alice", "newer").await;

        let snapshot = service.unread_snapshot("alice").await.unwrap();
        assert_eq!(snapshot.unread_count, 2);
        assert_eq!(snapshot.notifications[0].message, "newer");
    }
}
