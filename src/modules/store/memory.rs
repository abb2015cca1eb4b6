use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ChangeFeed, ChangeKind, Collection, RecordStore, Subscription};
use crate::core::error::{AppError, Result};
use crate::features::matching::models::{
    CreateMatchLink, LinkInsert, MatchLink, MatchLinkStatus, SetupStep,
};
use crate::features::notifications::models::{
    CreateNotification, Notification, NotificationFilter, NotificationStatus,
};
use crate::features::reports::models::{
    CreateReport, CreateReportDocument, Report, ReportDocument, ReportFilter, ReportKind,
    ReportStats, ReportStatus, ReportWithDocuments,
};
use crate::features::transactions::models::{
    CreateTransaction, PaymentDetails, Transaction, TransactionKind, TransactionStatus,
};
use crate::shared::types::PaginationQuery;

#[derive(Default)]
struct Tables {
    reports: Vec<Report>,
    documents: Vec<ReportDocument>,
    links: Vec<MatchLink>,
    transactions: Vec<Transaction>,
    notifications: Vec<Notification>,
}

/// Test double for `PgStore` with the same uniqueness and compare-and-set rules.
///
/// `fail_transaction_inserts` and `fail_report_updates` make the next N calls
/// fail, to exercise saga resumption and retried transitions.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    feed: ChangeFeed,
    fail_transaction_inserts: AtomicUsize,
    fail_report_updates: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_transaction_inserts(&self, count: usize) {
        self.fail_transaction_inserts.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_report_updates(&self, count: usize) {
        self.fail_report_updates.store(count, Ordering::SeqCst);
    }

    pub async fn all_match_links(&self) -> Vec<MatchLink> {
        self.tables.read().await.links.clone()
    }

    pub async fn all_transactions(&self) -> Vec<Transaction> {
        self.tables.read().await.transactions.clone()
    }

    pub async fn notifications_for(&self, user_id: &str) -> Vec<Notification> {
        self.tables
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    fn attach(tables: &Tables, report: &Report) -> ReportWithDocuments {
        ReportWithDocuments {
            report: report.clone(),
            documents: tables
                .documents
                .iter()
                .filter(|d| d.report_id == report.id)
                .cloned()
                .collect(),
        }
    }
}

/// Consume one pending injected failure, if any
fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn count_where(reports: &[Report], predicate: impl Fn(&Report) -> bool) -> i64 {
    reports.iter().filter(|r| predicate(r)).count() as i64
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert_report(
        &self,
        data: &CreateReport,
        documents: &[CreateReportDocument],
    ) -> Result<ReportWithDocuments> {
        let now = Utc::now();
        let report = Report {
            id: Uuid::now_v7(),
            owner_user_id: data.owner_user_id.clone(),
            kind: data.kind,
            status: ReportStatus::Active,
            recovery_fee: data.recovery_fee,
            reward_amount: data.reward_amount,
            collection_point: data.collection_point.clone(),
            description: data.description.clone(),
            location: data.location.clone(),
            created_at: now,
            updated_at: now,
        };
        let documents: Vec<ReportDocument> = documents
            .iter()
            .map(|d| ReportDocument {
                id: Uuid::now_v7(),
                report_id: report.id,
                document_type: d.document_type.clone(),
                document_number: d.document_number.clone(),
                photo_key: d.photo_key.clone(),
                is_recovered: false,
                created_at: now,
            })
            .collect();

        let mut tables = self.tables.write().await;
        tables.reports.push(report.clone());
        tables.documents.extend(documents.iter().cloned());
        drop(tables);

        self.feed.publish(
            Collection::Reports,
            ChangeKind::Insert,
            report.id,
            Some(&report.owner_user_id),
        );
        Ok(ReportWithDocuments { report, documents })
    }

    async fn get_report(&self, id: Uuid) -> Result<Option<ReportWithDocuments>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reports
            .iter()
            .find(|r| r.id == id)
            .map(|r| Self::attach(&tables, r)))
    }

    async fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<ReportWithDocuments>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reports
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| Self::attach(&tables, r))
            .collect())
    }

    async fn update_report_status(&self, ids: &[Uuid], status: ReportStatus) -> Result<u64> {
        if take_failure(&self.fail_report_updates) {
            return Err(AppError::Internal("injected report update failure".to_string()));
        }

        let mut tables = self.tables.write().await;
        let mut changed = Vec::new();
        for report in tables.reports.iter_mut() {
            if ids.contains(&report.id) && report.status < status {
                report.status = status;
                report.updated_at = Utc::now();
                changed.push((report.id, report.owner_user_id.clone()));
            }
        }
        drop(tables);

        for (id, owner) in &changed {
            self.feed
                .publish(Collection::Reports, ChangeKind::Update, *id, Some(owner));
        }
        Ok(changed.len() as u64)
    }

    async fn mark_documents_recovered(&self, report_id: Uuid) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut count = 0;
        for document in tables.documents.iter_mut() {
            if document.report_id == report_id && !document.is_recovered {
                document.is_recovered = true;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn report_stats(&self) -> Result<ReportStats> {
        let tables = self.tables.read().await;
        let reports = &tables.reports;

        Ok(ReportStats {
            lost_reports: count_where(reports, |r| r.kind == ReportKind::Lost),
            found_reports: count_where(reports, |r| r.kind == ReportKind::Found),
            active_reports: count_where(reports, |r| r.status == ReportStatus::Active),
            matches_in_progress: count_where(reports, |r| {
                matches!(
                    r.status,
                    ReportStatus::PotentialMatch | ReportStatus::MatchedSuccessfully
                )
            }),
            completed_reports: count_where(reports, |r| {
                matches!(r.status, ReportStatus::Recovered | ReportStatus::Completed)
            }),
        })
    }

    async fn insert_match_link(&self, data: &CreateMatchLink) -> Result<LinkInsert> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.links.iter().find(|l| {
            l.lost_report_id == data.lost_report_id || l.found_report_id == data.found_report_id
        }) {
            return Ok(LinkInsert::Existing(existing.clone()));
        }

        let now = Utc::now();
        let link = MatchLink {
            id: Uuid::now_v7(),
            lost_report_id: data.lost_report_id,
            found_report_id: data.found_report_id,
            status: MatchLinkStatus::Recovered,
            reward_claimed: false,
            document_type: data.document_type.clone(),
            setup_step: SetupStep::LinkCreated,
            setup_attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        tables.links.push(link.clone());
        drop(tables);

        self.feed
            .publish(Collection::MatchLinks, ChangeKind::Insert, link.id, None);
        Ok(LinkInsert::Created(link))
    }

    async fn get_match_link(&self, id: Uuid) -> Result<Option<MatchLink>> {
        let tables = self.tables.read().await;
        Ok(tables.links.iter().find(|l| l.id == id).cloned())
    }

    async fn find_match_link(&self, report_id: Uuid) -> Result<Option<MatchLink>> {
        let tables = self.tables.read().await;
        Ok(tables.links.iter().find(|l| l.involves(report_id)).cloned())
    }

    async fn list_linked_report_ids(&self, report_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        let tables = self.tables.read().await;
        Ok(report_ids
            .iter()
            .copied()
            .filter(|id| tables.links.iter().any(|l| l.involves(*id)))
            .collect())
    }

    async fn list_match_links_for_reports(&self, report_ids: &[Uuid]) -> Result<Vec<MatchLink>> {
        let tables = self.tables.read().await;
        let mut links: Vec<MatchLink> = tables
            .links
            .iter()
            .filter(|l| report_ids.iter().any(|id| l.involves(*id)))
            .cloned()
            .collect();
        links.reverse();
        Ok(links)
    }

    async fn list_unsettled_match_links(
        &self,
        max_attempts: i32,
        limit: i64,
    ) -> Result<Vec<MatchLink>> {
        let tables = self.tables.read().await;
        Ok(tables
            .links
            .iter()
            .filter(|l| !l.setup_step.is_settled() && l.setup_attempts < max_attempts)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn transition_match_link(
        &self,
        id: Uuid,
        from: MatchLinkStatus,
        to: MatchLinkStatus,
    ) -> Result<Option<MatchLink>> {
        let mut tables = self.tables.write().await;
        let Some(link) = tables
            .links
            .iter_mut()
            .find(|l| l.id == id && l.status == from)
        else {
            return Ok(None);
        };
        link.status = to;
        link.updated_at = Utc::now();
        let link = link.clone();
        drop(tables);

        self.feed
            .publish(Collection::MatchLinks, ChangeKind::Update, id, None);
        Ok(Some(link))
    }

    async fn mark_reward_claimed(&self, id: Uuid) -> Result<Option<MatchLink>> {
        let mut tables = self.tables.write().await;
        let Some(link) = tables.links.iter_mut().find(|l| {
            l.id == id && l.status == MatchLinkStatus::Completed && !l.reward_claimed
        }) else {
            return Ok(None);
        };
        link.reward_claimed = true;
        link.updated_at = Utc::now();
        Ok(Some(link.clone()))
    }

    async fn record_setup_progress(
        &self,
        id: Uuid,
        step: SetupStep,
        error: Option<&str>,
    ) -> Result<MatchLink> {
        let mut tables = self.tables.write().await;
        let link = tables
            .links
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Match link {} not found", id)))?;

        link.setup_step = step;
        match error {
            Some(message) => {
                link.setup_attempts += 1;
                link.last_error = Some(message.to_string());
            }
            None => link.last_error = None,
        }
        link.updated_at = Utc::now();
        Ok(link.clone())
    }

    async fn insert_transaction(&self, data: &CreateTransaction) -> Result<Transaction> {
        if take_failure(&self.fail_transaction_inserts) {
            return Err(AppError::Internal("injected transaction failure".to_string()));
        }

        let mut tables = self.tables.write().await;
        if tables
            .transactions
            .iter()
            .any(|t| t.report_id == data.report_id && t.kind == data.kind)
        {
            return Err(AppError::ConstraintViolation(
                "transactions_report_id_kind_key".to_string(),
            ));
        }

        let now = Utc::now();
        let tx = Transaction {
            id: Uuid::now_v7(),
            report_id: data.report_id,
            user_id: data.user_id.clone(),
            kind: data.kind,
            amount: data.amount,
            status: TransactionStatus::Pending,
            provider: None,
            phone_number: None,
            created_at: now,
            updated_at: now,
        };
        tables.transactions.push(tx.clone());
        drop(tables);

        self.feed.publish(
            Collection::Transactions,
            ChangeKind::Insert,
            tx.id,
            Some(&tx.user_id),
        );
        Ok(tx)
    }

    async fn find_transaction(
        &self,
        report_id: Uuid,
        kind: TransactionKind,
    ) -> Result<Option<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .find(|t| t.report_id == report_id && t.kind == kind)
            .cloned())
    }

    async fn transition_transaction(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
        payment: Option<&PaymentDetails>,
    ) -> Result<Option<Transaction>> {
        let mut tables = self.tables.write().await;
        let Some(tx) = tables
            .transactions
            .iter_mut()
            .find(|t| t.id == id && t.status == from)
        else {
            return Ok(None);
        };
        tx.status = to;
        if let Some(payment) = payment {
            tx.provider = Some(payment.provider.clone());
            tx.phone_number = Some(payment.phone_number.clone());
        }
        tx.updated_at = Utc::now();
        Ok(Some(tx.clone()))
    }

    async fn list_transactions_by_user(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        let mut txs: Vec<Transaction> = tables
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        txs.reverse();
        Ok(txs)
    }

    async fn insert_notification(&self, data: &CreateNotification) -> Result<Notification> {
        let mut tables = self.tables.write().await;
        if let Some(key) = &data.dedupe_key {
            if let Some(existing) = tables
                .notifications
                .iter()
                .find(|n| n.user_id == data.user_id && n.dedupe_key.as_ref() == Some(key))
            {
                return Ok(existing.clone());
            }
        }

        let notification = Notification {
            id: Uuid::now_v7(),
            user_id: data.user_id.clone(),
            message: data.message.clone(),
            kind: data.kind,
            status: NotificationStatus::Unread,
            related_report_id: data.related_report_id,
            action: data.action.clone(),
            dedupe_key: data.dedupe_key.clone(),
            created_at: Utc::now(),
            read_at: None,
        };
        tables.notifications.push(notification.clone());
        drop(tables);

        self.feed.publish(
            Collection::Notifications,
            ChangeKind::Insert,
            notification.id,
            Some(&notification.user_id),
        );
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        filter: NotificationFilter,
        page: &PaginationQuery,
    ) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .filter(|n| match filter {
                NotificationFilter::All => n.status != NotificationStatus::Deleted,
                NotificationFilter::Unread => n.status == NotificationStatus::Unread,
            })
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect())
    }

    async fn count_notifications(
        &self,
        user_id: &str,
        status: NotificationStatus,
    ) -> Result<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && n.status == status)
            .count() as i64)
    }

    async fn get_notification(&self, user_id: &str, id: Uuid) -> Result<Option<Notification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .iter()
            .find(|n| n.id == id && n.user_id == user_id)
            .cloned())
    }

    async fn set_notification_status(
        &self,
        user_id: &str,
        id: Uuid,
        from: &[NotificationStatus],
        to: NotificationStatus,
    ) -> Result<Option<Notification>> {
        let mut tables = self.tables.write().await;
        let Some(notification) = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id && from.contains(&n.status))
        else {
            return Ok(None);
        };
        notification.status = to;
        match to {
            NotificationStatus::Read => notification.read_at = Some(Utc::now()),
            NotificationStatus::Unread => notification.read_at = None,
            NotificationStatus::Deleted => {}
        }
        let notification = notification.clone();
        drop(tables);

        self.feed.publish(
            Collection::Notifications,
            ChangeKind::Update,
            id,
            Some(user_id),
        );
        Ok(Some(notification))
    }

    async fn set_all_notification_status(
        &self,
        user_id: &str,
        from: NotificationStatus,
        to: NotificationStatus,
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut changed = Vec::new();
        for notification in tables.notifications.iter_mut() {
            if notification.user_id == user_id && notification.status == from {
                notification.status = to;
                if to == NotificationStatus::Read {
                    notification.read_at = Some(Utc::now());
                }
                changed.push(notification.id);
            }
        }
        drop(tables);

        for id in &changed {
            self.feed.publish(
                Collection::Notifications,
                ChangeKind::Update,
                *id,
                Some(user_id),
            );
        }
        Ok(changed.len() as u64)
    }

    fn subscribe(&self, collection: Collection) -> Subscription {
        self.feed.subscribe(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(lost: Uuid, found: Uuid) -> CreateMatchLink {
        CreateMatchLink {
            lost_report_id: lost,
            found_report_id: found,
            document_type: "national_id".to_string(),
        }
    }

    #[tokio::test]
    async fn test_link_insert_is_unique_per_side() {
        let store = InMemoryStore::new();
        let (lost, found, other) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());

        let first = store.insert_match_link(&link(lost, found)).await.unwrap();
        assert!(matches!(first, LinkInsert::Created(_)));

        let again = store.insert_match_link(&link(lost, found)).await.unwrap();
        assert!(matches!(again, LinkInsert::Existing(_)));

        let same_found = store.insert_match_link(&link(other, found)).await.unwrap();
        assert!(matches!(same_found, LinkInsert::Existing(_)));

        assert_eq!(store.all_match_links().await.len(), 1);
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let store = InMemoryStore::new();
        let LinkInsert::Created(created) = store
            .insert_match_link(&link(Uuid::now_v7(), Uuid::now_v7()))
            .await
            .unwrap()
        else {
            panic!("expected a new link");
        };

        let moved = store
            .transition_match_link(
                created.id,
                MatchLinkStatus::Recovered,
                MatchLinkStatus::PaymentPending,
            )
            .await
            .unwrap();
        assert!(moved.is_some());

        let repeated = store
            .transition_match_link(
                created.id,
                MatchLinkStatus::Recovered,
                MatchLinkStatus::PaymentPending,
            )
            .await
            .unwrap();
        assert!(repeated.is_none());
    }

    #[tokio::test]
    async fn test_report_status_only_moves_forward() {
        let store = InMemoryStore::new();
        let report = store
            .insert_report(
                &CreateReport {
                    owner_user_id: "owner".to_string(),
                    kind: ReportKind::Lost,
                    recovery_fee: None,
                    reward_amount: None,
                    collection_point: None,
                    description: None,
                    location: None,
                },
                &[],
            )
            .await
            .unwrap()
            .report;

        let forward = store
            .update_report_status(&[report.id], ReportStatus::Completed)
            .await
            .unwrap();
        assert_eq!(forward, 1);

        let backward = store
            .update_report_status(&[report.id], ReportStatus::MatchedSuccessfully)
            .await
            .unwrap();
        assert_eq!(backward, 0);

        let current = store.get_report(report.id).await.unwrap().unwrap().report;
        assert_eq!(current.status, ReportStatus::Completed);
    }

    #[tokio::test]
    async fn test_notification_dedupe_returns_existing() {
        let store = InMemoryStore::new();
        let data = CreateNotification {
            user_id: "user-1".to_string(),
            message: "Match found".to_string(),
            kind: crate::features::notifications::models::NotificationKind::Match,
            related_report_id: None,
            action: None,
            dedupe_key: Some("match:1:lost".to_string()),
        };

        let first = store.insert_notification(&data).await.unwrap();
        let second = store.insert_notification(&data).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.notifications_for("user-1").await.len(), 1);
    }
}
