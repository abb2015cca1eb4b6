//! Record store client
//!
//! The narrow persistence interface the matching, workflow and notification
//! services run against: typed query / insert / conditional update operations
//! for the five record types plus a change feed to subscribe to writes.
//!
//! `PgStore` is the production implementation. `InMemoryStore` mirrors its
//! constraint semantics for service-level tests.

mod change_feed;
#[cfg(test)]
mod memory;
mod postgres;

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::matching::models::{
    CreateMatchLink, LinkInsert, MatchLink, MatchLinkStatus, SetupStep,
};
use crate::features::notifications::models::{
    CreateNotification, Notification, NotificationFilter, NotificationStatus,
};
use crate::features::reports::models::{
    CreateReport, CreateReportDocument, ReportFilter, ReportStats, ReportStatus,
    ReportWithDocuments,
};
use crate::features::transactions::models::{
    CreateTransaction, PaymentDetails, Transaction, TransactionKind, TransactionStatus,
};
use crate::shared::types::PaginationQuery;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind, Collection, Subscription};
#[cfg(test)]
pub use memory::InMemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    // ---------------------------------------------------------------------
    // Reports
    // ---------------------------------------------------------------------

    async fn insert_report(
        &self,
        report: &CreateReport,
        documents: &[CreateReportDocument],
    ) -> Result<ReportWithDocuments>;

    async fn get_report(&self, id: Uuid) -> Result<Option<ReportWithDocuments>>;

    /// Reports with nested documents, oldest first
    async fn list_reports(&self, filter: &ReportFilter) -> Result<Vec<ReportWithDocuments>>;

    /// Moves reports forward to `status`; reports already at or past it are left alone.
    /// Returns the number of reports updated
    async fn update_report_status(&self, ids: &[Uuid], status: ReportStatus) -> Result<u64>;

    async fn mark_documents_recovered(&self, report_id: Uuid) -> Result<u64>;

    async fn report_stats(&self) -> Result<ReportStats>;

    // ---------------------------------------------------------------------
    // Match links
    // ---------------------------------------------------------------------

    /// Insert guarded by unique indexes on both report ids. When either report
    /// is already linked the existing link is returned instead.
    async fn insert_match_link(&self, link: &CreateMatchLink) -> Result<LinkInsert>;

    async fn get_match_link(&self, id: Uuid) -> Result<Option<MatchLink>>;

    /// Link whose lost or found side is `report_id`
    async fn find_match_link(&self, report_id: Uuid) -> Result<Option<MatchLink>>;

    /// Subset of `report_ids` already referenced by a link
    async fn list_linked_report_ids(&self, report_ids: &[Uuid]) -> Result<HashSet<Uuid>>;

    async fn list_match_links_for_reports(&self, report_ids: &[Uuid]) -> Result<Vec<MatchLink>>;

    /// Links whose setup saga has not finished and still has attempts left
    async fn list_unsettled_match_links(
        &self,
        max_attempts: i32,
        limit: i64,
    ) -> Result<Vec<MatchLink>>;

    /// Compare-and-set on status. `None` when the link is not currently in `from`.
    async fn transition_match_link(
        &self,
        id: Uuid,
        from: MatchLinkStatus,
        to: MatchLinkStatus,
    ) -> Result<Option<MatchLink>>;

    /// Sets `reward_claimed` on a completed link that has not been claimed yet
    async fn mark_reward_claimed(&self, id: Uuid) -> Result<Option<MatchLink>>;

    /// Persist saga progress. With `error` the attempt counter grows and the step stays.
    async fn record_setup_progress(
        &self,
        id: Uuid,
        step: SetupStep,
        error: Option<&str>,
    ) -> Result<MatchLink>;

    // ---------------------------------------------------------------------
    // Transactions
    // ---------------------------------------------------------------------

    /// Fails with `ConstraintViolation` when (report_id, kind) already exists
    async fn insert_transaction(&self, tx: &CreateTransaction) -> Result<Transaction>;

    async fn find_transaction(
        &self,
        report_id: Uuid,
        kind: TransactionKind,
    ) -> Result<Option<Transaction>>;

    /// Compare-and-set on status, recording payment details when given
    async fn transition_transaction(
        &self,
        id: Uuid,
        from: TransactionStatus,
        to: TransactionStatus,
        payment: Option<&PaymentDetails>,
    ) -> Result<Option<Transaction>>;

    async fn list_transactions_by_user(&self, user_id: &str) -> Result<Vec<Transaction>>;

    // ---------------------------------------------------------------------
    // Notifications
    // ---------------------------------------------------------------------

    /// When `dedupe_key` is set and already used for the user, returns the existing row
    async fn insert_notification(&self, notification: &CreateNotification)
        -> Result<Notification>;

    /// Newest first, deleted rows excluded
    async fn list_notifications(
        &self,
        user_id: &str,
        filter: NotificationFilter,
        page: &PaginationQuery,
    ) -> Result<Vec<Notification>>;

    async fn count_notifications(&self, user_id: &str, status: NotificationStatus)
        -> Result<i64>;

    async fn get_notification(&self, user_id: &str, id: Uuid) -> Result<Option<Notification>>;

    /// Conditional transition of one notification. `None` when nothing changed.
    async fn set_notification_status(
        &self,
        user_id: &str,
        id: Uuid,
        from: &[NotificationStatus],
        to: NotificationStatus,
    ) -> Result<Option<Notification>>;

    async fn set_all_notification_status(
        &self,
        user_id: &str,
        from: NotificationStatus,
        to: NotificationStatus,
    ) -> Result<u64>;

    // ---------------------------------------------------------------------
    // Change notification
    // ---------------------------------------------------------------------

    fn subscribe(&self, collection: Collection) -> Subscription;
}
