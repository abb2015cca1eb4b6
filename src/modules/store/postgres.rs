use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::PgPool;
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
    CreateReport, CreateReportDocument, Report, ReportDocument, ReportFilter, ReportStats,
    ReportStatus, ReportWithDocuments,
};
use crate::features::transactions::models::{
    CreateTransaction, PaymentDetails, Transaction, TransactionKind, TransactionStatus,
};
use crate::shared::types::PaginationQuery;

const REPORT_COLUMNS: &str = "id, owner_user_id, kind, status, recovery_fee, reward_amount, \
     collection_point, description, location, created_at, updated_at";

const DOCUMENT_COLUMNS: &str =
    "id, report_id, document_type, document_number, photo_key, is_recovered, created_at";

const LINK_COLUMNS: &str = "id, lost_report_id, found_report_id, status, reward_claimed, \
     document_type, setup_step, setup_attempts, last_error, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "id, report_id, user_id, kind, amount, status, provider, \
     phone_number, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str = "id, user_id, message, kind, status, related_report_id, \
     action, dedupe_key, created_at, read_at";

/// Log and convert a database error
fn db_error(context: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |e| {
        tracing::error!("Failed to {}: {:?}", context, e);
        AppError::from(e)
    }
}

/// Postgres-backed record store. Every successful write is published on the change feed.
pub struct PgStore {
    pool: PgPool,
    feed: ChangeFeed,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            feed: ChangeFeed::new(),
        }
    }

    async fn documents_for(&self, report_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<ReportDocument>>> {
        if report_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let documents = sqlx::query_as::<_, ReportDocument>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM report_documents \
             WHERE report_id = ANY($1) ORDER BY created_at, id"
        ))
        .bind(report_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("fetch report documents"))?;

        let mut grouped: HashMap<Uuid, Vec<ReportDocument>> = HashMap::new();
        for document in documents {
            grouped.entry(document.report_id).or_default().push(document);
        }
        Ok(grouped)
    }

    async fn with_documents(&self, reports: Vec<Report>) -> Result<Vec<ReportWithDocuments>> {
        let ids: Vec<Uuid> = reports.iter().map(|r| r.id).collect();
        let mut documents = self.documents_for(&ids).await?;

        Ok(reports
            .into_iter()
            .map(|report| ReportWithDocuments {
                documents: documents.remove(&report.id).unwrap_or_default(),
                report,
            })
            .collect())
    }

    async fn find_link_holding(&self, lost_report_id: Uuid, found_report_id: Uuid) -> Result<Option<MatchLink>> {
        sqlx::query_as::<_, MatchLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM recovered_reports \
             WHERE lost_report_id = $1 OR found_report_id = $2 \
             ORDER BY created_at LIMIT 1"
        ))
        .bind(lost_report_id)
        .bind(found_report_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch existing match link"))
    }

    fn publish_link(&self, link: &MatchLink, kind: ChangeKind) {
        self.feed.publish(Collection::MatchLinks, kind, link.id, None);
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn insert_report(
        &self,
        data: &CreateReport,
        documents: &[CreateReportDocument],
    ) -> Result<ReportWithDocuments> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("begin report transaction"))?;

        let report = sqlx::query_as::<_, Report>(&format!(
            "INSERT INTO reports (id, owner_user_id, kind, status, recovery_fee, reward_amount, \
             collection_point, description, location) \
             VALUES ($1, $2, $3, 'active', $4, $5, $6, $7, $8) \
             RETURNING {REPORT_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(&data.owner_user_id)
        .bind(data.kind)
        .bind(data.recovery_fee)
        .bind(data.reward_amount)
        .bind(&data.collection_point)
        .bind(&data.description)
        .bind(&data.location)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("create report"))?;

        let mut stored = Vec::with_capacity(documents.len());
        for document in documents {
            let row = sqlx::query_as::<_, ReportDocument>(&format!(
                "INSERT INTO report_documents (id, report_id, document_type, document_number, photo_key) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING {DOCUMENT_COLUMNS}"
            ))
            .bind(Uuid::now_v7())
            .bind(report.id)
            .bind(&document.document_type)
            .bind(&document.document_number)
            .bind(&document.photo_key)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("create report document"))?;
            stored.push(row);
        }

        tx.commit()
            .await
            .map_err(db_error("commit report transaction"))?;

        tracing::info!(
            "Created {} report {} with {} documents",
            report.kind,
            report.id,
            stored.len()
        );

        self.feed.publish(
            Collection::Reports,
            ChangeKind::Insert,
            report.id,
            Some(&report.owner_user_id),
        );

        Ok(ReportWithDocuments {
            report,
            documents: stored,
        })
    }

    async fn get_report(&self, id: Uuid) -> Result<Option<ReportWithDocuments>> {
        let report = sqlx::query_as::<_, Report>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch report"))?;

        match report {
            Some(report) => Ok(self.with_documents(vec![report]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<ReportWithDocuments>> {
        let statuses: Vec<String> = filter.statuses.iter().map(|s| s.to_string()).collect();

        let reports = sqlx::query_as::<_, Report>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports \
             WHERE ($1::text IS NULL OR owner_user_id = $1) \
               AND ($2::text IS NULL OR kind::text = $2) \
               AND (cardinality($3::text[]) = 0 OR status::text = ANY($3)) \
             ORDER BY created_at, id"
        ))
        .bind(&filter.owner_user_id)
        .bind(filter.kind.map(|k| k.to_string()))
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list reports"))?;

        self.with_documents(reports).await
    }

    async fn update_report_status(&self, ids: &[Uuid], status: ReportStatus) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let updated: Vec<(Uuid, String)> = sqlx::query_as(
            "UPDATE reports SET status = $2, updated_at = NOW() \
             WHERE id = ANY($1) AND status < $2 \
             RETURNING id, owner_user_id",
        )
        .bind(ids)
        .bind(status)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("update report status"))?;

        for (id, owner) in &updated {
            self.feed
                .publish(Collection::Reports, ChangeKind::Update, *id, Some(owner));
        }

        Ok(updated.len() as u64)
    }

    async fn mark_documents_recovered(&self, report_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE report_documents SET is_recovered = TRUE \
             WHERE report_id = $1 AND is_recovered = FALSE",
        )
        .bind(report_id)
        .execute(&self.pool)
        .await
        .map_err(db_error("mark documents recovered"))?;

        Ok(result.rows_affected())
    }

    async fn report_stats(&self) -> Result<ReportStats> {
        sqlx::query_as::<_, ReportStats>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE kind = 'lost') AS lost_reports,
                COUNT(*) FILTER (WHERE kind = 'found') AS found_reports,
                COUNT(*) FILTER (WHERE status = 'active') AS active_reports,
                COUNT(*) FILTER (
                    WHERE status IN ('potential_match', 'matched_successfully')
                ) AS matches_in_progress,
                COUNT(*) FILTER (WHERE status IN ('recovered', 'completed')) AS completed_reports
            FROM reports
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("compute report stats"))
    }

    async fn insert_match_link(&self, data: &CreateMatchLink) -> Result<LinkInsert> {
        let inserted = sqlx::query_as::<_, MatchLink>(&format!(
            "INSERT INTO recovered_reports (id, lost_report_id, found_report_id, document_type) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT DO NOTHING \
             RETURNING {LINK_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(data.lost_report_id)
        .bind(data.found_report_id)
        .bind(&data.document_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("create match link"))?;

        if let Some(link) = inserted {
            tracing::info!(
                "Created match link {} (lost: {}, found: {})",
                link.id,
                link.lost_report_id,
                link.found_report_id
            );
            self.publish_link(&link, ChangeKind::Insert);
            return Ok(LinkInsert::Created(link));
        }

        // Rows in recovered_reports are never deleted, so the conflicting row is still there
        self.find_link_holding(data.lost_report_id, data.found_report_id)
            .await?
            .map(LinkInsert::Existing)
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Match link insert for {} / {} conflicted but no link exists",
                    data.lost_report_id, data.found_report_id
                ))
            })
    }

    async fn get_match_link(&self, id: Uuid) -> Result<Option<MatchLink>> {
        sqlx::query_as::<_, MatchLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM recovered_reports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch match link"))
    }

    async fn find_match_link(&self, report_id: Uuid) -> Result<Option<MatchLink>> {
        self.find_link_holding(report_id, report_id).await
    }

    async fn list_linked_report_ids(&self, report_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
        if report_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
            "SELECT lost_report_id, found_report_id FROM recovered_reports \
             WHERE lost_report_id = ANY($1) OR found_report_id = ANY($1)",
        )
        .bind(report_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list linked reports"))?;

        let wanted: HashSet<Uuid> = report_ids.iter().copied().collect();
        Ok(rows
            .into_iter()
            .flat_map(|(lost, found)| [lost, found])
            .filter(|id| wanted.contains(id))
            .collect())
    }

    async fn list_match_links_for_reports(&self, report_ids: &[Uuid]) -> Result<Vec<MatchLink>> {
        if report_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, MatchLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM recovered_reports \
             WHERE lost_report_id = ANY($1) OR found_report_id = ANY($1) \
             ORDER BY created_at DESC"
        ))
        .bind(report_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list match links"))
    }

    async fn list_unsettled_match_links(
        &self,
        max_attempts: i32,
        limit: i64,
    ) -> Result<Vec<MatchLink>> {
        sqlx::query_as::<_, MatchLink>(&format!(
            "SELECT {LINK_COLUMNS} FROM recovered_reports \
             WHERE setup_step <> 'owners_notified' AND setup_attempts < $1 \
             ORDER BY created_at \
             LIMIT $2"
        ))
        .bind(max_attempts)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list unsettled match links"))
    }

    async fn transition_match_link(
        &self,
        id: Uuid,
        from: MatchLinkStatus,
        to: MatchLinkStatus,
    ) -> Result<Option<MatchLink>> {
        let link = sqlx::query_as::<_, MatchLink>(&format!(
            "UPDATE recovered_reports SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {LINK_COLUMNS}"
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("transition match link"))?;

        if let Some(link) = &link {
            tracing::info!("Match link {} moved {} -> {}", id, from, to);
            self.publish_link(link, ChangeKind::Update);
        }
        Ok(link)
    }

    async fn mark_reward_claimed(&self, id: Uuid) -> Result<Option<MatchLink>> {
        let link = sqlx::query_as::<_, MatchLink>(&format!(
            "UPDATE recovered_reports SET reward_claimed = TRUE, updated_at = NOW() \
             WHERE id = $1 AND status = 'completed' AND reward_claimed = FALSE \
             RETURNING {LINK_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("mark reward claimed"))?;

        if let Some(link) = &link {
            self.publish_link(link, ChangeKind::Update);
        }
        Ok(link)
    }

    async fn record_setup_progress(
        &self,
        id: Uuid,
        step: SetupStep,
        error: Option<&str>,
    ) -> Result<MatchLink> {
        let query = match error {
            None => format!(
                "UPDATE recovered_reports SET setup_step = $2, last_error = NULL, updated_at = NOW() \
                 WHERE id = $1 RETURNING {LINK_COLUMNS}"
            ),
            Some(_) => format!(
                "UPDATE recovered_reports SET setup_step = $2, last_error = $3, \
                 setup_attempts = setup_attempts + 1, updated_at = NOW() \
                 WHERE id = $1 RETURNING {LINK_COLUMNS}"
            ),
        };

        let mut q = sqlx::query_as::<_, MatchLink>(&query).bind(id).bind(step);
        if let Some(message) = error {
            q = q.bind(message);
        }

        q.fetch_optional(&self.pool)
            .await
            .map_err(db_error("record setup progress"))?
            .ok_or_else(|| AppError::NotFound(format!("Match link {} not found", id)))
    }

    async fn insert_transaction(&self, data: &CreateTransaction) -> Result<Transaction> {
        let tx = sqlx::query_as::<_, Transaction>(&format!(
            "INSERT INTO transactions (id, report_id, user_id, kind, amount, status) \
             VALUES ($1, $2, $3, $4, $5, 'pending') \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(data.report_id)
        .bind(&data.user_id)
        .bind(data.kind)
        .bind(data.amount)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create transaction"))?;

        tracing::info!(
            "Created {} transaction {} of {} for report {}",
            tx.kind,
            tx.id,
            tx.amount,
            tx.report_id
        );

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
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE report_id = $1 AND kind = $2"
        ))
        .bind(report_id)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch transaction"))
    }

    async fn transition_transaction(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
        payment: Option<&PaymentDetails>,
    ) -> Result<Option<Transaction>> {
        let tx = sqlx::query_as::<_, Transaction>(&format!(
            "UPDATE transactions SET status = $3, \
                 provider = COALESCE($4, provider), \
                 phone_number = COALESCE($5, phone_number), \
                 updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(payment.map(|p| p.provider.as_str()))
        .bind(payment.map(|p| p.phone_number.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("transition transaction"))?;

        if let Some(tx) = &tx {
            tracing::info!("Transaction {} moved {} -> {}", id, from, to);
            self.feed.publish(
                Collection::Transactions,
                ChangeKind::Update,
                tx.id,
                Some(&tx.user_id),
            );
        }
        Ok(tx)
    }

    async fn list_transactions_by_user(&self, user_id: &str) -> Result<Vec<Transaction>> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list transactions"))
    }

    async fn insert_notification(&self, data: &CreateNotification) -> Result<Notification> {
        let inserted = sqlx::query_as::<_, Notification>(&format!(
            "INSERT INTO notifications (id, user_id, message, kind, status, related_report_id, action, dedupe_key) \
             VALUES ($1, $2, $3, $4, 'unread', $5, $6, $7) \
             ON CONFLICT (user_id, dedupe_key) WHERE dedupe_key IS NOT NULL DO NOTHING \
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(&data.user_id)
        .bind(&data.message)
        .bind(data.kind)
        .bind(data.related_report_id)
        .bind(&data.action)
        .bind(&data.dedupe_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("create notification"))?;

        if let Some(notification) = inserted {
            self.feed.publish(
                Collection::Notifications,
                ChangeKind::Insert,
                notification.id,
                Some(&notification.user_id),
            );
            return Ok(notification);
        }

        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 AND dedupe_key = $2"
        ))
        .bind(&data.user_id)
        .bind(&data.dedupe_key)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("fetch deduplicated notification"))
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        filter: NotificationFilter,
        page: &PaginationQuery,
    ) -> Result<Vec<Notification>> {
        let status_clause = match filter {
            NotificationFilter::All => "status <> 'deleted'",
            NotificationFilter::Unread => "status = 'unread'",
        };

        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 AND {status_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list notifications"))
    }

    async fn count_notifications(
        &self,
        user_id: &str,
        status: NotificationStatus,
    ) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND status = $2",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("count notifications"))
    }

    async fn get_notification(&self, user_id: &str, id: Uuid) -> Result<Option<Notification>> {
        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch notification"))
    }

    async fn set_notification_status(
        &self,
        user_id: &str,
        id: Uuid,
        from: &[NotificationStatus],
        to: NotificationStatus,
    ) -> Result<Option<Notification>> {
        let from: Vec<String> = from.iter().map(|s| s.to_string()).collect();

        let notification = sqlx::query_as::<_, Notification>(&format!(
            "UPDATE notifications SET status = $3, \
                 read_at = CASE WHEN $3 = 'read' THEN NOW() \
                                WHEN $3 = 'unread' THEN NULL \
                                ELSE read_at END \
             WHERE id = $1 AND user_id = $2 AND status::text = ANY($4) \
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(to)
        .bind(&from)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("update notification status"))?;

        if let Some(notification) = &notification {
            self.feed.publish(
                Collection::Notifications,
                ChangeKind::Update,
                notification.id,
                Some(user_id),
            );
        }
        Ok(notification)
    }

    async fn set_all_notification_status(
        &self,
        user_id: &str,
        from: NotificationStatus,
        to: NotificationStatus,
    ) -> Result<u64> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE notifications SET status = $3, \
                 read_at = CASE WHEN $3 = 'read' THEN NOW() ELSE read_at END \
             WHERE user_id = $1 AND status = $2 \
             RETURNING id",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("bulk update notification status"))?;

        for id in &ids {
            self.feed.publish(
                Collection::Notifications,
                ChangeKind::Update,
                *id,
                Some(user_id),
            );
        }
        Ok(ids.len() as u64)
    }

    fn subscribe(&self, collection: Collection) -> Subscription {
        self.feed.subscribe(collection)
    }
}
