mod report;
mod report_document;

pub use report::{
    CreateReport, Report, ReportFilter, ReportKind, ReportStats, ReportStatus, ReportWithDocuments,
};
pub use report_document::{CreateReportDocument, ReportDocument};
