use std::collections::HashSet;
use std::sync::Arc;

use minijinja::context;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core::config::MatchingConfig;
use crate::core::error::{AppError, Result};
use crate::features::matching::matcher::{find_matches, MatchCandidate};
use crate::features::matching::models::{
    CreateMatchLink, LinkInsert, MatchLink, MatchLinkStatus, SetupStep,
};
use crate::features::notifications::models::NotificationKind;
use crate::features::notifications::{NotificationOptions, NotificationService, NotificationTemplate};
use crate::features::reports::models::{Report, ReportFilter, ReportStatus};
use crate::features::transactions::services::TransactionService;
use crate::modules::store::RecordStore;
use crate::shared::cache::TtlCache;
use crate::shared::constants::{
    cache_key_user_reports, CACHE_KEY_REPORT_STATS, CACHE_PATTERN_USER_REPORTS,
};

/// Outcome of one matcher run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MatchRunSummary {
    /// Candidates the matcher produced
    pub candidates: usize,
    /// New links created
    pub created: usize,
    /// Candidates dropped because a report was already linked
    pub skipped: usize,
    /// Candidates whose link insert failed
    pub failed: usize,
}

/// Turns matcher output into match links and drives each link through its setup saga
pub struct MatchService {
    store: Arc<dyn RecordStore>,
    transactions: Arc<TransactionService>,
    notifications: Arc<NotificationService>,
    cache: Arc<TtlCache>,
    config: MatchingConfig,
    run_lock: Mutex<()>,
}

impl MatchService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        transactions: Arc<TransactionService>,
        notifications: Arc<NotificationService>,
        cache: Arc<TtlCache>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            store,
            transactions,
            notifications,
            cache,
            config,
            run_lock: Mutex::new(()),
        }
    }

    /// Run the matcher over all active reports and apply every new match.
    ///
    /// Returns `None` when another run is already in progress; the trigger is
    /// coalesced into that run.
    pub async fn run(&self) -> Result<Option<MatchRunSummary>> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            tracing::debug!("Match run already in progress, coalescing trigger");
            return Ok(None);
        };

        let reports = self
            .store
            .list_reports(&ReportFilter::with_status(ReportStatus::Active))
            .await?;
        let candidates = find_matches(&reports);

        let mut summary = MatchRunSummary {
            candidates: candidates.len(),
            ..MatchRunSummary::default()
        };
        if candidates.is_empty() {
            return Ok(Some(summary));
        }

        let report_ids: Vec<Uuid> = candidates
            .iter()
            .flat_map(|c| [c.lost_report_id, c.found_report_id])
            .collect();
        let already_linked = self.store.list_linked_report_ids(&report_ids).await?;

        // Reports used by an earlier candidate in this run
        let mut used: HashSet<Uuid> = HashSet::new();

        for candidate in &candidates {
            let ids = [candidate.lost_report_id, candidate.found_report_id];
            if ids
                .iter()
                .any(|id| already_linked.contains(id) || used.contains(id))
            {
                summary.skipped += 1;
                continue;
            }

            match self.apply_match(candidate).await {
                Ok(LinkInsert::Created(_)) => summary.created += 1,
                Ok(LinkInsert::Existing(existing)) => {
                    tracing::debug!(
                        "Reports {} / {} already held by link {}",
                        candidate.lost_report_id,
                        candidate.found_report_id,
                        existing.id
                    );
                    summary.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(
                        "Failed to apply match {} / {}: {:?}",
                        candidate.lost_report_id,
                        candidate.found_report_id,
                        e
                    );
                    summary.failed += 1;
                    continue;
                }
            }
            used.extend(ids);
        }

        tracing::info!(
            "Match run finished: {} candidates, {} created, {} skipped, {} failed",
            summary.candidates,
            summary.created,
            summary.skipped,
            summary.failed
        );

        Ok(Some(summary))
    }

    /// Create the link for `candidate` and run its setup saga.
    ///
    /// A saga failure does not fail the match: the step is recorded on the
    /// link and the processor resumes it later.
    pub async fn apply_match(&self, candidate: &MatchCandidate) -> Result<LinkInsert> {
        let inserted = self
            .store
            .insert_match_link(&CreateMatchLink {
                lost_report_id: candidate.lost_report_id,
                found_report_id: candidate.found_report_id,
                document_type: candidate.document_type().to_string(),
            })
            .await?;

        if let LinkInsert::Created(link) = &inserted {
            tracing::info!(
                "Matched lost report {} with found report {} ({} documents)",
                link.lost_report_id,
                link.found_report_id,
                candidate.documents.len()
            );
            if let Err(e) = self.advance_setup(link.clone()).await {
                tracing::warn!("Setup of match {} incomplete: {}", link.id, e);
            }
        }

        Ok(inserted)
    }

    /// Run the remaining setup steps of `link`, persisting progress after each one
    pub async fn advance_setup(&self, mut link: MatchLink) -> Result<MatchLink> {
        while let Some(step) = link.setup_step.next() {
            if let Err(e) = self.perform_step(&link, step).await {
                tracing::warn!(
                    "Match {} setup step {} failed (attempt {}): {}",
                    link.id,
                    step,
                    link.setup_attempts + 1,
                    e
                );
                self.store
                    .record_setup_progress(link.id, link.setup_step, Some(&e.to_string()))
                    .await?;
                return Err(e);
            }

            link = self.store.record_setup_progress(link.id, step, None).await?;
            tracing::debug!("Match {} reached setup step {}", link.id, step);
        }

        Ok(link)
    }

    /// Resume links whose setup stopped part-way. Returns how many finished.
    pub async fn resume_unsettled(&self) -> Result<usize> {
        let links = self
            .store
            .list_unsettled_match_links(self.config.max_setup_attempts, self.config.resume_batch_size)
            .await?;

        if links.is_empty() {
            return Ok(0);
        }

        tracing::info!("Resuming setup of {} match links", links.len());

        let mut settled = 0;
        for link in links {
            let id = link.id;
            match self.advance_setup(link).await {
                Ok(_) => settled += 1,
                Err(e) => tracing::error!("Failed to resume setup of match {}: {:?}", id, e),
            }
        }

        Ok(settled)
    }

    /// Admin repair: resume unsettled setups, then drop every cached report view.
    ///
    /// A step that wrote report statuses but died before invalidating leaves stale
    /// listings behind, and nothing records whose they were.
    pub async fn repair(&self) -> Result<usize> {
        let settled = self.resume_unsettled().await?;

        self.cache.invalidate(CACHE_KEY_REPORT_STATS).await;
        let dropped = self.cache.invalidate_pattern(CACHE_PATTERN_USER_REPORTS).await;
        tracing::info!(
            "Repair settled {} match links and dropped {} cached report listings",
            settled,
            dropped
        );
        Ok(settled)
    }

    /// Links involving any report owned by `user_id`, newest first
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<(MatchLink, Report)>> {
        let reports = self
            .store
            .list_reports(&ReportFilter::owned_by(user_id))
            .await?;
        let ids: Vec<Uuid> = reports.iter().map(|r| r.report.id).collect();
        let links = self.store.list_match_links_for_reports(&ids).await?;

        Ok(links
            .into_iter()
            .filter_map(|link| {
                reports
                    .iter()
                    .find(|r| link.involves(r.report.id))
                    .map(|r| (link, r.report.clone()))
            })
            .collect())
    }

    async fn perform_step(&self, link: &MatchLink, step: SetupStep) -> Result<()> {
        match step {
            SetupStep::LinkCreated => Ok(()),
            SetupStep::ReportsFlagged => self.flag_reports(link).await,
            SetupStep::TransactionsCreated => {
                let (lost, found) = self.load_reports(link).await?;
                self.transactions.ensure_for_report(&lost).await?;
                self.transactions.ensure_for_report(&found).await?;
                Ok(())
            }
            SetupStep::OwnersNotified => {
                let (lost, found) = self.load_reports(link).await?;
                self.notify_owners(link, &lost, &found).await;
                Ok(())
            }
        }
    }

    async fn flag_reports(&self, link: &MatchLink) -> Result<()> {
        // A resumed saga must not pull reports back once the owner has moved on
        let current = self
            .store
            .get_match_link(link.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Match link {} not found", link.id)))?;
        if current.status != MatchLinkStatus::Recovered {
            return Ok(());
        }

        self.store
            .update_report_status(
                &[link.lost_report_id, link.found_report_id],
                ReportStatus::PotentialMatch,
            )
            .await?;

        let (lost, found) = self.load_reports(link).await?;
        self.invalidate_report_caches(&[&lost.owner_user_id, &found.owner_user_id])
            .await;
        Ok(())
    }

    async fn notify_owners(&self, link: &MatchLink, lost: &Report, found: &Report) {
        let ctx = context! { document_type => &link.document_type };

        self.notifications
            .notify(
                &lost.owner_user_id,
                NotificationTemplate::MatchFoundOwner,
                ctx.clone(),
                NotificationOptions::new(NotificationKind::Match)
                    .report(lost.id)
                    .action(format!("/matches/{}", lost.id))
                    .dedupe(format!("match:{}:lost", link.id)),
            )
            .await;

        self.notifications
            .notify(
                &found.owner_user_id,
                NotificationTemplate::MatchFoundFinder,
                ctx,
                NotificationOptions::new(NotificationKind::Match)
                    .report(found.id)
                    .action(format!("/matches/{}", found.id))
                    .dedupe(format!("match:{}:found", link.id)),
            )
            .await;
    }

    async fn load_reports(&self, link: &MatchLink) -> Result<(Report, Report)> {
        Ok((
            self.load_report(link.lost_report_id).await?,
            self.load_report(link.found_report_id).await?,
        ))
    }

    async fn load_report(&self, id: Uuid) -> Result<Report> {
        self.store
            .get_report(id)
            .await?
            .map(|r| r.report)
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))
    }

    async fn invalidate_report_caches(&self, owners: &[&str]) {
        self.cache.invalidate(CACHE_KEY_REPORT_STATS).await;
        for owner in owners {
            self.cache.invalidate(&cache_key_user_reports(owner)).await;
        }
    }
}
