mod report_service;

pub use report_service::{ReportService, ALLOWED_PHOTO_TYPES};
