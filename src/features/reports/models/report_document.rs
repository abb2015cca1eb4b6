use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for a document listed on a report
#[derive(Debug, Clone, FromRow)]
pub struct ReportDocument {
    pub id: Uuid,
    pub report_id: Uuid,
    pub document_type: String,
    pub document_number: String,
    /// Storage key of the uploaded photo, if any
    pub photo_key: Option<String>,
    pub is_recovered: bool,
    pub created_at: DateTime<Utc>,
}

/// Data for creating a new report document
#[derive(Debug, Clone)]
pub struct CreateReportDocument {
    pub document_type: String,
    pub document_number: String,
    pub photo_key: Option<String>,
}
