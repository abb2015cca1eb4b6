use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

/// Default number of buffered events per subscriber before it starts lagging
const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Reports,
    MatchLinks,
    Transactions,
    Notifications,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
}

/// A committed write, published after the store call returns successfully
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub record_id: Uuid,
    /// Owner of the record when the record has one
    pub user_id: Option<String>,
}

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(
        &self,
        collection: Collection,
        kind: ChangeKind,
        record_id: Uuid,
        user_id: Option<&str>,
    ) {
        // No subscribers is not an error
        let _ = self.sender.send(ChangeEvent {
            collection,
            kind,
            record_id,
            user_id: user_id.map(str::to_string),
        });
    }

    pub fn subscribe(&self, collection: Collection) -> Subscription {
        Subscription {
            collection,
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by `subscribe`; dropping it unsubscribes
pub struct Subscription {
    collection: Collection,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Next event for the subscribed collection, `None` once the feed is closed.
    /// A lagging subscriber skips the events it missed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.collection == self.collection => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Change subscriber for {:?} lagged, skipped {} events",
                        self.collection,
                        skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_filters_by_collection() {
        let feed = ChangeFeed::new();
        let mut sub = feed.subscribe(Collection::Notifications);

        let report_id = Uuid::now_v7();
        let notification_id = Uuid::now_v7();
        feed.publish(Collection::Reports, ChangeKind::Insert, report_id, None);
        feed.publish(
            Collection::Notifications,
            ChangeKind::Insert,
            notification_id,
            Some("user-1"),
        );

        let event = sub.next().await.unwrap();
        assert_eq!(event.record_id, notification_id);
        assert_eq!(event.user_id.as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_recovers() {
        let feed = ChangeFeed::with_capacity(2);
        let mut sub = feed.subscribe(Collection::Reports);

        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::now_v7()).collect();
        for id in &ids {
            feed.publish(Collection::Reports, ChangeKind::Insert, *id, None);
        }

        // Oldest events were dropped; the newest are still delivered
        let event = sub.next().await.unwrap();
        assert_eq!(event.record_id, ids[3]);
    }

    #[tokio::test]
    async fn test_closed_feed_ends_subscription() {
        let feed = ChangeFeed::new();
        let mut sub = feed.subscribe(Collection::Reports);
        drop(feed);
        assert!(sub.next().await.is_none());
    }
}
