use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::matching::models::{MatchLink, MatchLinkStatus};
use crate::features::matching::services::MatchRunSummary;
use crate::features::reports::models::{Report, ReportKind};

/// A match link as stored
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatchLinkDto {
    pub id: Uuid,
    pub lost_report_id: Uuid,
    pub found_report_id: Uuid,
    pub status: MatchLinkStatus,
    pub reward_claimed: bool,
    pub document_type: String,
    /// False while the setup steps after linking are still pending
    pub setup_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MatchLink> for MatchLinkDto {
    fn from(link: MatchLink) -> Self {
        Self {
            id: link.id,
            lost_report_id: link.lost_report_id,
            found_report_id: link.found_report_id,
            status: link.status,
            reward_claimed: link.reward_claimed,
            document_type: link.document_type,
            setup_complete: link.setup_step.is_settled(),
            created_at: link.created_at,
            updated_at: link.updated_at,
        }
    }
}

/// A match seen from one of the caller's reports
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MyMatchDto {
    /// The caller's report in this match
    pub report_id: Uuid,
    /// `lost` when the caller is the owner, `found` when they are the finder
    pub report_kind: ReportKind,
    #[serde(rename = "match")]
    pub link: MatchLinkDto,
}

impl From<(MatchLink, Report)> for MyMatchDto {
    fn from((link, report): (MatchLink, Report)) -> Self {
        Self {
            report_id: report.id,
            report_kind: report.kind,
            link: link.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatchRunResponseDto {
    /// False when the request joined a run that was already in progress
    pub started: bool,
    pub summary: Option<MatchRunSummary>,
}
