use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::features::reports::models::{
    CreateReport, CreateReportDocument, Report, ReportDocument, ReportKind, ReportStatus,
};
use crate::shared::validation::{DOCUMENT_NUMBER_REGEX, DOCUMENT_TYPE_REGEX};

/// A document listed on a new report
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DocumentDto {
    #[validate(regex(
        path = *DOCUMENT_TYPE_REGEX,
        message = "Document type must be a lowercase slug such as 'national_id'"
    ))]
    #[schema(example = "national_id")]
    pub document_type: String,

    #[validate(regex(
        path = *DOCUMENT_NUMBER_REGEX,
        message = "Document number must be 3-40 letters, digits, spaces, '-' or '/'"
    ))]
    #[schema(example = "12345678")]
    pub document_number: String,

    /// Key returned by the photo upload endpoint
    #[validate(length(max = 512))]
    pub photo_key: Option<String>,
}

/// Request DTO for filing a lost or found report
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_report"))]
pub struct CreateReportDto {
    pub kind: ReportKind,

    #[validate(
        length(min = 1, max = 10, message = "A report lists between 1 and 10 documents"),
        nested
    )]
    pub documents: Vec<DocumentDto>,

    /// Fee the owner offers; the platform default applies when absent
    #[schema(value_type = Option<String>, example = "200")]
    pub recovery_fee: Option<Decimal>,

    /// Reward the finder asks for; the platform default applies when absent
    #[schema(value_type = Option<String>, example = "100")]
    pub reward_amount: Option<Decimal>,

    /// Where the finder left the document. Required for found reports.
    #[validate(length(min = 1, max = 255))]
    pub collection_point: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    /// Where the document was lost or found
    #[validate(length(max = 255))]
    pub location: Option<String>,
}

fn validate_create_report(dto: &CreateReportDto) -> Result<(), ValidationError> {
    let negative = [dto.recovery_fee, dto.reward_amount]
        .iter()
        .flatten()
        .any(|amount| amount.is_sign_negative());
    if negative {
        return Err(ValidationError::new("negative_amount")
            .with_message("Fee and reward must not be negative".into()));
    }

    let has_collection_point = dto
        .collection_point
        .as_deref()
        .is_some_and(|p| !p.trim().is_empty());
    if dto.kind == ReportKind::Found && !has_collection_point {
        return Err(ValidationError::new("collection_point_required")
            .with_message("Found reports need a collection point".into()));
    }

    Ok(())
}

impl CreateReportDto {
    pub fn into_parts(self, owner_user_id: &str) -> (CreateReport, Vec<CreateReportDocument>) {
        let report = CreateReport {
            owner_user_id: owner_user_id.to_string(),
            kind: self.kind,
            recovery_fee: self.recovery_fee,
            reward_amount: self.reward_amount,
            collection_point: self.collection_point.map(|p| p.trim().to_string()),
            description: self.description,
            location: self.location,
        };

        let documents = self
            .documents
            .into_iter()
            .map(|d| CreateReportDocument {
                document_type: d.document_type,
                document_number: d.document_number.trim().to_string(),
                photo_key: d.photo_key,
            })
            .collect();

        (report, documents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponseDto {
    pub id: Uuid,
    pub document_type: String,
    pub document_number: String,
    /// Short-lived link to the uploaded photo
    pub photo_url: Option<String>,
    pub is_recovered: bool,
}

impl DocumentResponseDto {
    pub fn new(document: ReportDocument, photo_url: Option<String>) -> Self {
        Self {
            id: document.id,
            document_type: document.document_type,
            document_number: document.document_number,
            photo_url,
            is_recovered: document.is_recovered,
        }
    }
}

/// Response DTO for report
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportResponseDto {
    pub id: Uuid,
    pub kind: ReportKind,
    pub status: ReportStatus,
    #[schema(value_type = Option<String>)]
    pub recovery_fee: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub reward_amount: Option<Decimal>,
    pub collection_point: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub documents: Vec<DocumentResponseDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportResponseDto {
    pub fn new(report: Report, documents: Vec<DocumentResponseDto>) -> Self {
        Self {
            id: report.id,
            kind: report.kind,
            status: report.status,
            recovery_fee: report.recovery_fee,
            reward_amount: report.reward_amount,
            collection_point: report.collection_point,
            description: report.description,
            location: report.location,
            documents,
            created_at: report.created_at,
            updated_at: report.updated_at,
        }
    }
}

/// Multipart form for a document photo
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct PhotoUploadDto {
    /// JPEG, PNG or WebP image
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PhotoUploadResponseDto {
    /// Pass this as `photo_key` when filing the report
    pub photo_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::MAX_DOCUMENTS_PER_REPORT;

    fn dto(kind: ReportKind, documents: usize) -> CreateReportDto {
        CreateReportDto {
            kind,
            documents: (0..documents)
                .map(|i| DocumentDto {
                    document_type: "national_id".to_string(),
                    document_number: format!("1234567{}", i),
                    photo_key: None,
                })
                .collect(),
            recovery_fee: None,
            reward_amount: None,
            collection_point: Some("Huduma Centre GPO".to_string()),
            description: None,
            location: None,
        }
    }

    #[test]
    fn test_valid_report() {
        assert!(dto(ReportKind::Lost, 1).validate().is_ok());
        assert!(dto(ReportKind::Found, 10).validate().is_ok());
    }

    #[test]
    fn test_document_count_bounds() {
        let too_many = MAX_DOCUMENTS_PER_REPORT as usize + 1;
        assert!(dto(ReportKind::Lost, 0).validate().is_err());
        assert!(dto(ReportKind::Lost, too_many).validate().is_err());
    }

    #[test]
    fn test_found_report_needs_collection_point() {
        let mut report = dto(ReportKind::Found, 1);
        report.collection_point = Some("   ".to_string());
        assert!(report.validate().is_err());

        let mut lost = dto(ReportKind::Lost, 1);
        lost.collection_point = None;
        assert!(lost.validate().is_ok());
    }

    #[test]
    fn test_negative_amounts_rejected() {
        let mut report = dto(ReportKind::Lost, 1);
        report.recovery_fee = Some(Decimal::from(-1));
        assert!(report.validate().is_err());
    }

    #[test]
    fn test_bad_document_fields_rejected() {
        let mut report = dto(ReportKind::Lost, 1);
        report.documents[0].document_type = "National ID".to_string();
        assert!(report.validate().is_err());

        let mut report = dto(ReportKind::Lost, 1);
        report.documents[0].document_number = "!".to_string();
        assert!(report.validate().is_err());
    }

    #[test]
    fn test_into_parts_trims_input() {
        let mut report = dto(ReportKind::Found, 1);
        report.documents[0].document_number = "  AB 123  ".to_string();
        report.collection_point = Some(" Kencom ".to_string());
        let (create, documents) = report.into_parts("finder");
        assert_eq!(create.owner_user_id, "finder");
        assert_eq!(create.collection_point.as_deref(), Some("Kencom"));
        assert_eq!(documents[0].document_number, "AB 123");
    }
}
