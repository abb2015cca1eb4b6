use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

/// Progress of a matched pair. Only ever moves forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Type, ToSchema,
)]
#[sqlx(type_name = "match_link_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchLinkStatus {
    Recovered,
    PaymentPending,
    Completed,
}

impl std::fmt::Display for MatchLinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchLinkStatus::Recovered => write!(f, "recovered"),
            MatchLinkStatus::PaymentPending => write!(f, "payment_pending"),
            MatchLinkStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Durable step of the match setup saga. Each step is idempotent and the
/// executor resumes from the stored step after a failure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Type, ToSchema,
)]
#[sqlx(type_name = "match_setup_step", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SetupStep {
    LinkCreated,
    ReportsFlagged,
    TransactionsCreated,
    OwnersNotified,
}

impl SetupStep {
    pub fn next(self) -> Option<SetupStep> {
        match self {
            SetupStep::LinkCreated => Some(SetupStep::ReportsFlagged),
            SetupStep::ReportsFlagged => Some(SetupStep::TransactionsCreated),
            SetupStep::TransactionsCreated => Some(SetupStep::OwnersNotified),
            SetupStep::OwnersNotified => None,
        }
    }

    pub fn is_settled(self) -> bool {
        self == SetupStep::OwnersNotified
    }
}

impl std::fmt::Display for SetupStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupStep::LinkCreated => write!(f, "link_created"),
            SetupStep::ReportsFlagged => write!(f, "reports_flagged"),
            SetupStep::TransactionsCreated => write!(f, "transactions_created"),
            SetupStep::OwnersNotified => write!(f, "owners_notified"),
        }
    }
}

/// Database model for the link between a lost report and a found report
#[derive(Debug, Clone, FromRow)]
pub struct MatchLink {
    pub id: Uuid,
    pub lost_report_id: Uuid,
    pub found_report_id: Uuid,
    pub status: MatchLinkStatus,
    pub reward_claimed: bool,
    /// Document type that produced the match
    pub document_type: String,
    pub setup_step: SetupStep,
    pub setup_attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MatchLink {
    pub fn involves(&self, report_id: Uuid) -> bool {
        self.lost_report_id == report_id || self.found_report_id == report_id
    }
}

/// Data for creating a new match link
#[derive(Debug, Clone)]
pub struct CreateMatchLink {
    pub lost_report_id: Uuid,
    pub found_report_id: Uuid,
    pub document_type: String,
}

/// Outcome of the idempotent link insert
#[derive(Debug, Clone)]
pub enum LinkInsert {
    Created(MatchLink),
    /// A link already holds one of the two reports
    Existing(MatchLink),
}
