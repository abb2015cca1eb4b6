mod report_dto;

pub use report_dto::{
    CreateReportDto, DocumentDto, DocumentResponseDto, PhotoUploadDto, PhotoUploadResponseDto,
    ReportResponseDto,
};
