use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::reports::dtos::{
    CreateReportDto, DocumentResponseDto, ReportResponseDto,
};
use crate::features::reports::models::{ReportFilter, ReportStats, ReportWithDocuments};
use crate::modules::storage::PhotoStorage;
use crate::modules::store::RecordStore;
use crate::shared::cache::TtlCache;
use crate::shared::constants::{cache_key_user_reports, CACHE_KEY_REPORT_STATS, MAX_PHOTO_SIZE};

/// Image types accepted for document photos
pub const ALLOWED_PHOTO_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// Service for lost and found reports
pub struct ReportService {
    store: Arc<dyn RecordStore>,
    cache: Arc<TtlCache>,
    storage: Option<Arc<dyn PhotoStorage>>,
    stats_ttl: Duration,
}

impl ReportService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        cache: Arc<TtlCache>,
        storage: Option<Arc<dyn PhotoStorage>>,
        stats_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            storage,
            stats_ttl,
        }
    }

    /// File a report. The match processor picks it up from the change feed.
    pub async fn create(
        &self,
        user: &AuthenticatedUser,
        dto: CreateReportDto,
    ) -> Result<ReportWithDocuments> {
        let (report, documents) = dto.into_parts(&user.user_id);
        let created = self.store.insert_report(&report, &documents).await?;

        self.cache.invalidate(CACHE_KEY_REPORT_STATS).await;
        self.cache
            .invalidate(&cache_key_user_reports(&user.user_id))
            .await;

        tracing::info!(
            "{} report {} filed by {} with {} documents",
            created.report.kind,
            created.report.id,
            user.user_id,
            created.documents.len()
        );
        Ok(created)
    }

    /// The caller's reports, oldest first
    pub async fn list_mine(&self, user_id: &str) -> Result<Vec<ReportWithDocuments>> {
        let key = cache_key_user_reports(user_id);
        self.cache
            .cached(&key, self.cache.default_ttl(), || async {
                self.store.list_reports(&ReportFilter::owned_by(user_id)).await
            })
            .await
    }

    /// A single report; only its owner may read it
    pub async fn get(&self, user: &AuthenticatedUser, id: Uuid) -> Result<ReportWithDocuments> {
        let report = self
            .store
            .get_report(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;

        if report.report.owner_user_id != user.user_id {
            return Err(AppError::Forbidden(
                "You can only view your own reports".to_string(),
            ));
        }

        Ok(report)
    }

    /// Public counts for the landing page
    pub async fn stats(&self) -> Result<ReportStats> {
        self.cache
            .cached(CACHE_KEY_REPORT_STATS, self.stats_ttl, || async {
                self.store.report_stats().await
            })
            .await
    }

    /// Store a document photo and return its storage key
    pub async fn upload_photo(
        &self,
        user: &AuthenticatedUser,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let storage = self.storage()?;

        if data.is_empty() {
            return Err(AppError::BadRequest("Photo is empty".to_string()));
        }
        if data.len() > MAX_PHOTO_SIZE {
            return Err(AppError::BadRequest(format!(
                "Photo too large. Maximum size is {} MB",
                MAX_PHOTO_SIZE / 1024 / 1024
            )));
        }
        let extension = photo_extension(content_type).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Photo type '{}' is not allowed. Allowed types: {}",
                content_type,
                ALLOWED_PHOTO_TYPES.join(", ")
            ))
        })?;

        let key = storage.generate_key(&user.user_id, extension);
        storage.upload(&key, data, content_type).await?;

        tracing::debug!("Photo {} uploaded by {}", key, user.user_id);
        Ok(key)
    }

    /// Build the response, presigning photo links. A photo that cannot be
    /// presigned is returned without a link.
    pub async fn to_response(&self, report: ReportWithDocuments) -> ReportResponseDto {
        let mut documents = Vec::with_capacity(report.documents.len());
        for document in report.documents {
            let photo_url = match (&document.photo_key, &self.storage) {
                (Some(key), Some(storage)) => match storage.presigned_url(key).await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        tracing::warn!("Failed to presign photo {}: {}", key, e);
                        None
                    }
                },
                _ => None,
            };
            documents.push(DocumentResponseDto::new(document, photo_url));
        }

        ReportResponseDto::new(report.report, documents)
    }

    fn storage(&self) -> Result<&Arc<dyn PhotoStorage>> {
        self.storage
            .as_ref()
            .ok_or_else(|| AppError::Storage("Photo storage is not configured".to_string()))
    }
}

fn photo_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reports::dtos::DocumentDto;
    use crate::features::reports::models::{ReportKind, ReportStatus};
    use crate::modules::store::InMemoryStore;
    use crate::shared::test_helpers::{test_cache, test_user};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStorage {
        uploads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PhotoStorage for FakeStorage {
        async fn upload(
            &self,
            key: &str,
            _data: Vec<u8>,
            _content_type: &str,
        ) -> std::result::Result<String, AppError> {
            self.uploads.lock().unwrap().push(key.to_string());
            Ok(key.to_string())
        }

        async fn presigned_url(&self, key: &str) -> std::result::Result<String, AppError> {
            Ok(format!("https://photos.test/{}?sig=abc", key))
        }

        fn generate_key(&self, user_id: &str, extension: &str) -> String {
            format!("documents/{}/photo.{}", user_id, extension)
        }
    }

    fn service(store: Arc<InMemoryStore>, storage: Option<Arc<dyn PhotoStorage>>) -> ReportService {
        ReportService::new(store, test_cache(), storage, Duration::from_secs(60))
    }

    fn lost_report(photo_key: Option<&str>) -> CreateReportDto {
        CreateReportDto {
            kind: ReportKind::Lost,
            documents: vec![DocumentDto {
                document_type: "passport".to_string(),
                document_number: "AK0099887".to_string(),
                photo_key: photo_key.map(str::to_string),
            }],
            recovery_fee: None,
            reward_amount: None,
            collection_point: None,
            description: Some("Lost near the bus stage".to_string()),
            location: Some("Westlands".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_invalidates_cached_listing_and_stats() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(store, None);
        let user = test_user("amina");

        assert!(service.list_mine("amina").await.unwrap().is_empty());
        assert_eq!(service.stats().await.unwrap().lost_reports, 0);

        let created = service.create(&user, lost_report(None)).await.unwrap();
        assert_eq!(created.report.status, ReportStatus::Active);

        let mine = service.list_mine("amina").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(service.stats().await.unwrap().lost_reports, 1);
    }

    #[tokio::test]
    async fn test_only_owner_can_read_report() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(store, None);
        let created = service
            .create(&test_user("amina"), lost_report(None))
            .await
            .unwrap();

        assert!(service.get(&test_user("amina"), created.report.id).await.is_ok());
        let other = service.get(&test_user("brian"), created.report.id).await;
        assert!(matches!(other, Err(AppError::Forbidden(_))));

        let missing = service.get(&test_user("amina"), Uuid::now_v7()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_upload_photo_checks_type_and_size() {
        let store = Arc::new(InMemoryStore::new());
        let storage = Arc::new(FakeStorage::default());
        let service = service(store, Some(storage.clone()));
        let user = test_user("amina");

        let key = service
            .upload_photo(&user, vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(key, "documents/amina/photo.png");

        let pdf = service.upload_photo(&user, vec![1], "application/pdf").await;
        assert!(matches!(pdf, Err(AppError::BadRequest(_))));

        let huge = service
            .upload_photo(&user, vec![0; MAX_PHOTO_SIZE + 1], "image/jpeg")
            .await;
        assert!(matches!(huge, Err(AppError::BadRequest(_))));

        assert_eq!(storage.uploads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_without_storage_fails() {
        let service = service(Arc::new(InMemoryStore::new()), None);
        let result = service
            .upload_photo(&test_user("amina"), vec![1], "image/png")
            .await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn test_response_presigns_photos() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(store, Some(Arc::new(FakeStorage::default())));
        let created = service
            .create(&test_user("amina"), lost_report(Some("documents/amina/photo.png")))
            .await
            .unwrap();

        let response = service.to_response(created).await;
        assert_eq!(
            response.documents[0].photo_url.as_deref(),
            Some("https://photos.test/documents/amina/photo.png?sig=abc")
        );
    }
}
