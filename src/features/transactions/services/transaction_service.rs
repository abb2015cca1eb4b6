use std::sync::Arc;

use crate::core::config::MatchingConfig;
use crate::core::error::{AppError, Result};
use crate::features::reports::models::{Report, ReportKind};
use crate::features::transactions::models::{CreateTransaction, Transaction, TransactionKind};
use crate::modules::store::RecordStore;

/// Service for recovery fee and reward transactions
pub struct TransactionService {
    store: Arc<dyn RecordStore>,
    config: MatchingConfig,
}

impl TransactionService {
    pub fn new(store: Arc<dyn RecordStore>, config: MatchingConfig) -> Self {
        Self { store, config }
    }

    /// The pending transaction a report carries: Recovery for lost reports, Reward for found ones
    pub fn kind_for(report: &Report) -> TransactionKind {
        match report.kind {
            ReportKind::Lost => TransactionKind::Recovery,
            ReportKind::Found => TransactionKind::Reward,
        }
    }

    /// Amount for a new transaction, falling back to the configured defaults
    pub fn amount_for(&self, report: &Report) -> rust_decimal::Decimal {
        match report.kind {
            ReportKind::Lost => report.resolved_recovery_fee(self.config.default_recovery_fee),
            ReportKind::Found => report.resolved_reward_amount(self.config.default_reward_amount),
        }
    }

    /// Return the report's transaction, creating it as pending when missing.
    /// An existing transaction is kept whatever its status.
    pub async fn ensure_for_report(&self, report: &Report) -> Result<Transaction> {
        let kind = Self::kind_for(report);
        if let Some(existing) = self.store.find_transaction(report.id, kind).await? {
            return Ok(existing);
        }

        let data = CreateTransaction {
            report_id: report.id,
            user_id: report.owner_user_id.clone(),
            kind,
            amount: self.amount_for(report),
        };

        match self.store.insert_transaction(&data).await {
            Ok(tx) => Ok(tx),
            // Lost the race against a concurrent insert
            Err(AppError::ConstraintViolation(_)) => self
                .store
                .find_transaction(report.id, kind)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(format!(
                        "{} transaction for report {} conflicted but is missing",
                        kind, report.id
                    ))
                }),
            Err(e) => Err(e),
        }
    }

    pub async fn list_mine(&self, user_id: &str) -> Result<Vec<Transaction>> {
        self.store.list_transactions_by_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reports::models::CreateReport;
    use crate::features::transactions::models::TransactionStatus;
    use crate::modules::store::InMemoryStore;
    use rust_decimal::Decimal;

    async fn report(store: &InMemoryStore, kind: ReportKind, fee: Option<i64>) -> Report {
        store
            .insert_report(
                &CreateReport {
                    owner_user_id: "owner".to_string(),
                    kind,
                    recovery_fee: fee.map(Decimal::from),
                    reward_amount: fee.map(Decimal::from),
                    collection_point: None,
                    description: None,
                    location: None,
                },
                &[],
            )
            .await
            .unwrap()
            .report
    }

    #[tokio::test]
    async fn test_defaults_apply_when_report_has_no_amount() {
        let store = Arc::new(InMemoryStore::new());
        let service = TransactionService::new(store.clone(), MatchingConfig::default());

        let lost = report(&store, ReportKind::Lost, None).await;
        let found = report(&store, ReportKind::Found, None).await;

        let recovery = service.ensure_for_report(&lost).await.unwrap();
        let reward = service.ensure_for_report(&found).await.unwrap();

        assert_eq!(recovery.kind, TransactionKind::Recovery);
        assert_eq!(recovery.amount, Decimal::from(200));
        assert_eq!(reward.kind, TransactionKind::Reward);
        assert_eq!(reward.amount, Decimal::from(100));
        assert_eq!(recovery.status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn test_stored_amount_is_used() {
        let store = Arc::new(InMemoryStore::new());
        let service = TransactionService::new(store.clone(), MatchingConfig::default());

        let lost = report(&store, ReportKind::Lost, Some(500)).await;
        let tx = service.ensure_for_report(&lost).await.unwrap();
        assert_eq!(tx.amount, Decimal::from(500));
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        let service = TransactionService::new(store.clone(), MatchingConfig::default());

        let lost = report(&store, ReportKind::Lost, None).await;
        let first = service.ensure_for_report(&lost).await.unwrap();
        let second = service.ensure_for_report(&lost).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.all_transactions().await.len(), 1);
    }
}
