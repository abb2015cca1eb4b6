use std::sync::Arc;

use minijinja::context;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::matching::models::{MatchLink, MatchLinkStatus};
use crate::features::notifications::models::NotificationKind;
use crate::features::notifications::{NotificationOptions, NotificationService, NotificationTemplate};
use crate::features::reports::models::{Report, ReportStatus};
use crate::features::transactions::models::{
    PaymentDetails, Transaction, TransactionKind, TransactionStatus,
};
use crate::features::transactions::services::TransactionService;
use crate::modules::store::RecordStore;
use crate::shared::cache::TtlCache;
use crate::shared::constants::{cache_key_user_reports, CACHE_KEY_REPORT_STATS};
use crate::shared::validation::{normalize_phone, PHONE_REGEX};

/// A match link with both reports, resolved from either report id
#[derive(Debug, Clone)]
pub struct RecoveryContext {
    pub link: MatchLink,
    pub lost: Report,
    pub found: Report,
}

/// What the caller may see of a match
#[derive(Debug, Clone)]
pub struct RecoveryStatus {
    pub link: MatchLink,
    /// Which side of the link the caller owns
    pub side: RecoverySide,
    /// The caller's own transaction for this match, if created yet
    pub transaction: Option<Transaction>,
    /// Revealed to the owner once the recovery fee is paid
    pub collection_point: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySide {
    Owner,
    Finder,
}

/// Drives a match from verification to payment to the finder's payout
pub struct RecoveryService {
    store: Arc<dyn RecordStore>,
    transactions: Arc<TransactionService>,
    notifications: Arc<NotificationService>,
    cache: Arc<TtlCache>,
}

impl RecoveryService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        transactions: Arc<TransactionService>,
        notifications: Arc<NotificationService>,
        cache: Arc<TtlCache>,
    ) -> Self {
        Self {
            store,
            transactions,
            notifications,
            cache,
        }
    }

    /// The owner of the lost report confirms the found document is theirs.
    ///
    /// A retry after a failure that left the link ahead of the reports finishes the
    /// remaining steps. Once the reports are flagged, a repeat is a `Conflict`.
    pub async fn confirm_ownership(
        &self,
        user: &AuthenticatedUser,
        report_id: Uuid,
    ) -> Result<MatchLink> {
        let ctx = self.load(report_id).await?;
        Self::require_owner(user, &ctx.lost)?;

        let link = match ctx.link.status {
            MatchLinkStatus::Recovered => {
                self.advance(
                    &ctx.link,
                    MatchLinkStatus::Recovered,
                    MatchLinkStatus::PaymentPending,
                )
                .await?
            }
            MatchLinkStatus::PaymentPending
                if ctx.lost.status < ReportStatus::MatchedSuccessfully =>
            {
                tracing::info!("Resuming ownership confirmation for match {}", ctx.link.id);
                ctx.link.clone()
            }
            _ => return Err(Self::wrong_state(&ctx.link, MatchLinkStatus::Recovered)),
        };

        let fee = self.transactions.amount_for(&ctx.lost);
        self.notifications
            .notify(
                &ctx.lost.owner_user_id,
                NotificationTemplate::PayRecoveryFee,
                context! { amount => fee.to_string() },
                NotificationOptions::new(NotificationKind::Verification)
                    .report(ctx.lost.id)
                    .action(format!("/matches/{}/payment", ctx.lost.id))
                    .dedupe(format!("verified:{}:lost", link.id)),
            )
            .await;
        self.notifications
            .notify(
                &ctx.found.owner_user_id,
                NotificationTemplate::OwnerVerified,
                context! {},
                NotificationOptions::new(NotificationKind::Verification)
                    .report(ctx.found.id)
                    .dedupe(format!("verified:{}:found", link.id)),
            )
            .await;

        // Last write: flagged reports mark the confirmation as settled
        self.set_report_status(&ctx, ReportStatus::MatchedSuccessfully)
            .await?;

        tracing::info!("Ownership confirmed for match {} by {}", link.id, user.user_id);
        Ok(link)
    }

    /// Record the owner's recovery fee payment and reveal the collection point.
    ///
    /// Like `confirm_ownership`, a retry on a completed link whose reports lag behind
    /// finishes the remaining steps without charging again.
    pub async fn complete_payment(
        &self,
        user: &AuthenticatedUser,
        report_id: Uuid,
        payment: PaymentDetails,
    ) -> Result<String> {
        let payment = Self::checked_payment(payment)?;
        let ctx = self.load(report_id).await?;
        Self::require_owner(user, &ctx.lost)?;

        let collection_point = ctx.found.collection_point.clone().ok_or_else(|| {
            AppError::Internal(format!("Found report {} has no collection point", ctx.found.id))
        })?;

        let link = match ctx.link.status {
            MatchLinkStatus::PaymentPending => {
                // Repairs a transaction the match setup never created
                let recovery = self.transactions.ensure_for_report(&ctx.lost).await?;
                if recovery.status == TransactionStatus::Pending {
                    self.store
                        .transition_transaction(
                            recovery.id,
                            TransactionStatus::Pending,
                            TransactionStatus::Completed,
                            Some(&payment),
                        )
                        .await?;
                }

                self.advance(
                    &ctx.link,
                    MatchLinkStatus::PaymentPending,
                    MatchLinkStatus::Completed,
                )
                .await?
            }
            MatchLinkStatus::Completed if ctx.lost.status < ReportStatus::Completed => {
                tracing::info!("Resuming payment completion for match {}", ctx.link.id);
                ctx.link.clone()
            }
            _ => return Err(Self::wrong_state(&ctx.link, MatchLinkStatus::PaymentPending)),
        };

        self.store.mark_documents_recovered(ctx.lost.id).await?;
        let reward = self.transactions.ensure_for_report(&ctx.found).await?;

        self.notifications
            .notify(
                &ctx.lost.owner_user_id,
                NotificationTemplate::LocationRevealed,
                context! { collection_point => &collection_point },
                NotificationOptions::new(NotificationKind::Payment)
                    .report(ctx.lost.id)
                    .action(format!("/matches/{}", ctx.lost.id))
                    .dedupe(format!("paid:{}:lost", link.id)),
            )
            .await;
        self.notifications
            .notify(
                &ctx.found.owner_user_id,
                NotificationTemplate::RewardAvailable,
                context! { amount => reward.amount.to_string() },
                NotificationOptions::new(NotificationKind::Reward)
                    .report(ctx.found.id)
                    .action(format!("/matches/{}/reward", ctx.found.id))
                    .dedupe(format!("paid:{}:found", link.id)),
            )
            .await;

        // Last write, so report listings are invalidated after the documents change
        self.set_report_status(&ctx, ReportStatus::Completed).await?;

        tracing::info!(
            "Recovery fee paid for match {} via {}",
            link.id,
            payment.provider
        );
        Ok(collection_point)
    }

    /// The finder requests their reward payout
    pub async fn claim_reward(
        &self,
        user: &AuthenticatedUser,
        report_id: Uuid,
        payout: PaymentDetails,
    ) -> Result<Transaction> {
        let payout = Self::checked_payment(payout)?;
        let ctx = self.load(report_id).await?;
        Self::require_owner(user, &ctx.found)?;

        if ctx.link.status != MatchLinkStatus::Completed {
            return Err(Self::wrong_state(&ctx.link, MatchLinkStatus::Completed));
        }
        if ctx.link.reward_claimed {
            return Err(AppError::Conflict("Reward already claimed".to_string()));
        }

        let reward = self.transactions.ensure_for_report(&ctx.found).await?;
        // A claimed transaction with an unflagged link is a retry after a partial failure
        let claimed = match reward.status {
            TransactionStatus::Claimed => reward,
            _ => self
                .store
                .transition_transaction(
                    reward.id,
                    TransactionStatus::Pending,
                    TransactionStatus::Claimed,
                    Some(&payout),
                )
                .await?
                .ok_or_else(|| AppError::Conflict("Reward already claimed".to_string()))?,
        };

        self.store
            .mark_reward_claimed(ctx.link.id)
            .await?
            .ok_or_else(|| AppError::Conflict("Reward already claimed".to_string()))?;

        self.notifications
            .notify(
                &ctx.found.owner_user_id,
                NotificationTemplate::RewardClaimed,
                context! {
                    amount => claimed.amount.to_string(),
                    phone_number => &payout.phone_number,
                },
                NotificationOptions::new(NotificationKind::Reward)
                    .report(ctx.found.id)
                    .dedupe(format!("claimed:{}:found", ctx.link.id)),
            )
            .await;

        tracing::info!("Reward claimed for match {}", ctx.link.id);
        Ok(claimed)
    }

    /// Match state as seen by the owner of either report
    pub async fn get_status(
        &self,
        user: &AuthenticatedUser,
        report_id: Uuid,
    ) -> Result<RecoveryStatus> {
        let ctx = self.load(report_id).await?;

        let (side, own_report) = if ctx.lost.owner_user_id == user.user_id {
            (RecoverySide::Owner, &ctx.lost)
        } else if ctx.found.owner_user_id == user.user_id {
            (RecoverySide::Finder, &ctx.found)
        } else {
            return Err(AppError::Forbidden(
                "You are not a party to this match".to_string(),
            ));
        };

        let kind = match side {
            RecoverySide::Owner => TransactionKind::Recovery,
            RecoverySide::Finder => TransactionKind::Reward,
        };
        let transaction = self.store.find_transaction(own_report.id, kind).await?;

        let collection_point = match (side, ctx.link.status) {
            (RecoverySide::Owner, MatchLinkStatus::Completed) => ctx.found.collection_point.clone(),
            (RecoverySide::Finder, _) => ctx.found.collection_point.clone(),
            _ => None,
        };

        Ok(RecoveryStatus {
            link: ctx.link,
            side,
            transaction,
            collection_point,
        })
    }

    /// Resolve the link holding `report_id` together with both reports
    pub async fn load(&self, report_id: Uuid) -> Result<RecoveryContext> {
        let link = self
            .store
            .find_match_link(report_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No matching record".to_string()))?;

        let lost = self.load_report(link.lost_report_id).await?;
        let found = self.load_report(link.found_report_id).await?;

        Ok(RecoveryContext { link, lost, found })
    }

    async fn load_report(&self, id: Uuid) -> Result<Report> {
        self.store
            .get_report(id)
            .await?
            .map(|r| r.report)
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))
    }

    async fn advance(
        &self,
        link: &MatchLink,
        from: MatchLinkStatus,
        to: MatchLinkStatus,
    ) -> Result<MatchLink> {
        self.store
            .transition_match_link(link.id, from, to)
            .await?
            .ok_or_else(|| Self::wrong_state(link, from))
    }

    async fn set_report_status(&self, ctx: &RecoveryContext, status: ReportStatus) -> Result<()> {
        self.store
            .update_report_status(&[ctx.lost.id, ctx.found.id], status)
            .await?;

        self.cache.invalidate(CACHE_KEY_REPORT_STATS).await;
        self.cache
            .invalidate(&cache_key_user_reports(&ctx.lost.owner_user_id))
            .await;
        self.cache
            .invalidate(&cache_key_user_reports(&ctx.found.owner_user_id))
            .await;
        Ok(())
    }

    fn checked_payment(details: PaymentDetails) -> Result<PaymentDetails> {
        let phone_number = normalize_phone(&details.phone_number);
        if !PHONE_REGEX.is_match(&phone_number) {
            return Err(AppError::Validation(format!(
                "Invalid phone number: {}",
                details.phone_number
            )));
        }
        let provider = details.provider.trim().to_string();
        if provider.is_empty() {
            return Err(AppError::Validation("Payment provider is required".to_string()));
        }
        Ok(PaymentDetails {
            provider,
            phone_number,
        })
    }

    fn require_owner(user: &AuthenticatedUser, report: &Report) -> Result<()> {
        if report.owner_user_id != user.user_id {
            return Err(AppError::Forbidden(format!(
                "Only the owner of the {} report can do this",
                report.kind
            )));
        }
        Ok(())
    }

    fn wrong_state(link: &MatchLink, expected: MatchLinkStatus) -> AppError {
        AppError::Conflict(format!(
            "Match {} is not in state {} (currently {})",
            link.id, expected, link.status
        ))
    }
}
