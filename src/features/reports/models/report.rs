use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::reports::models::ReportDocument;

/// Whether a report describes a document someone lost or one someone found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "report_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Lost,
    Found,
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportKind::Lost => write!(f, "lost"),
            ReportKind::Found => write!(f, "found"),
        }
    }
}

/// Report lifecycle. Reports are never deleted; they only move forward through these
/// states, in declaration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Type, ToSchema,
)]
#[sqlx(type_name = "report_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Active,
    PotentialMatch,
    MatchedSuccessfully,
    Recovered,
    Completed,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::Active => write!(f, "active"),
            ReportStatus::PotentialMatch => write!(f, "potential_match"),
            ReportStatus::MatchedSuccessfully => write!(f, "matched_successfully"),
            ReportStatus::Recovered => write!(f, "recovered"),
            ReportStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Database model for report
#[derive(Debug, Clone, FromRow)]
pub struct Report {
    pub id: Uuid,
    pub owner_user_id: String,
    pub kind: ReportKind,
    pub status: ReportStatus,
    pub recovery_fee: Option<Decimal>,
    pub reward_amount: Option<Decimal>,
    pub collection_point: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    /// Fee the owner pays to learn the collection point
    pub fn resolved_recovery_fee(&self, default: Decimal) -> Decimal {
        resolve_amount(self.recovery_fee, default)
    }

    /// Amount paid out to the finder
    pub fn resolved_reward_amount(&self, default: Decimal) -> Decimal {
        resolve_amount(self.reward_amount, default)
    }
}

fn resolve_amount(stored: Option<Decimal>, default: Decimal) -> Decimal {
    match stored {
        Some(amount) if !amount.is_sign_negative() => amount,
        _ => default,
    }
}

/// A report together with its documents, as the matcher consumes it
#[derive(Debug, Clone)]
pub struct ReportWithDocuments {
    pub report: Report,
    pub documents: Vec<ReportDocument>,
}

/// Data for creating a new report
#[derive(Debug, Clone)]
pub struct CreateReport {
    pub owner_user_id: String,
    pub kind: ReportKind,
    pub recovery_fee: Option<Decimal>,
    pub reward_amount: Option<Decimal>,
    pub collection_point: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
}

/// Report listing filter. Empty fields do not restrict.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub owner_user_id: Option<String>,
    pub kind: Option<ReportKind>,
    pub statuses: Vec<ReportStatus>,
}

impl ReportFilter {
    pub fn with_status(status: ReportStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Self::default()
        }
    }

    pub fn owned_by(user_id: &str) -> Self {
        Self {
            owner_user_id: Some(user_id.to_string()),
            ..Self::default()
        }
    }

    pub fn matches(&self, report: &Report) -> bool {
        self.owner_user_id
            .as_deref()
            .is_none_or(|owner| owner == report.owner_user_id)
            && self.kind.is_none_or(|kind| kind == report.kind)
            && (self.statuses.is_empty() || self.statuses.contains(&report.status))
    }
}

/// Aggregate counts for the public landing page
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, FromRow)]
pub struct ReportStats {
    pub lost_reports: i64,
    pub found_reports: i64,
    pub active_reports: i64,
    pub matches_in_progress: i64,
    pub completed_reports: i64,
}
