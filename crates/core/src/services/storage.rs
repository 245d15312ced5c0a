//! Attachment storage for dispute messages.

use async_trait::async_trait;
use bytes::Bytes;
use mercado_common::{
    AppError, AppResult, DisputeConfig, StorageBackend, UploadedFile, generate_storage_key,
    get_metrics,
};
use mercado_db::entities::dispute_message::Attachment;
use std::sync::Arc;

/// Type alias for the storage service.
pub type StorageService = Arc<dyn StorageBackend>;

/// A file received with a request, not yet stored.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Validates and stores message attachments.
#[derive(Clone)]
pub struct AttachmentService {
    storage: StorageService,
    max_files: usize,
    max_bytes: usize,
    allowed_mime_types: Vec<String>,
}

impl AttachmentService {
    /// Create an attachment service using the limits in `config`.
    #[must_use]
    pub fn new(storage: StorageService, config: &DisputeConfig) -> Self {
        Self {
            storage,
            max_files: config.max_attachments,
            max_bytes: config.max_attachment_bytes,
            allowed_mime_types: config.allowed_mime_types.clone(),
        }
    }

    /// Check count, size and type of a batch before anything is written.
    pub fn validate(&self, uploads: &[AttachmentUpload]) -> AppResult<()> {
        if uploads.len() > self.max_files {
            return Err(AppError::Validation(format!(
                "At most {} attachments per message",
                self.max_files
            )));
        }

        for upload in uploads {
            if upload.data.is_empty() {
                return Err(AppError::Validation(format!(
                    "Attachment {} is empty",
                    upload.file_name
                )));
            }
            if upload.data.len() > self.max_bytes {
                return Err(AppError::Validation(format!(
                    "Attachment {} exceeds {} bytes",
                    upload.file_name, self.max_bytes
                )));
            }
            if !self
                .allowed_mime_types
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&upload.content_type))
            {
                return Err(AppError::Validation(format!(
                    "Attachment type {} is not allowed",
                    upload.content_type
                )));
            }
        }

        Ok(())
    }

    /// Validate and upload a batch under the dispute's folder.
    pub async fn store(
        &self,
        dispute_id: &str,
        uploads: Vec<AttachmentUpload>,
    ) -> AppResult<Vec<Attachment>> {
        self.validate(&uploads)?;

        let folder = format!("disputes/{dispute_id}");
        let mut stored = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let key = generate_storage_key(&folder, &upload.file_name);
            let file = match self
                .storage
                .upload(&key, &upload.data, &upload.content_type)
                .await
            {
                Ok(file) => file,
                Err(e) => {
                    self.discard(&stored).await;
                    return Err(e);
                }
            };

            tracing::debug!(key = %file.key, size = file.size, "Stored dispute attachment");

            stored.push(Attachment {
                name: upload.file_name,
                mime: file.content_type,
                size: file.size,
                url: file.url,
                key: file.key,
            });
        }

        get_metrics()
            .attachments_uploaded
            .fetch_add(stored.len() as u64, std::sync::atomic::Ordering::Relaxed);

        Ok(stored)
    }

    /// Remove files stored for a write that did not go through.
    pub async fn discard(&self, attachments: &[Attachment]) {
        for attachment in attachments.iter().filter(|a| !a.key.is_empty()) {
            if let Err(e) = self.storage.delete(&attachment.key).await {
                tracing::warn!(error = %e, key = %attachment.key, "Failed to remove orphaned attachment");
            }
        }
    }
}

/// Storage backend that keeps nothing, for tests or when uploads are disabled.
#[derive(Clone, Default)]
pub struct NoOpStorage {
    base_url: String,
}

impl NoOpStorage {
    /// Create a new no-op storage backend.
    #[must_use]
    pub const fn new(base_url: String) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl StorageBackend for NoOpStorage {
    async fn upload(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> AppResult<UploadedFile> {
        Ok(UploadedFile {
            key: key.to_string(),
            url: self.public_url(key),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            md5: String::new(),
        })
    }

    async fn delete(&self, _key: &str) -> AppResult<()> {
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service() -> AttachmentService {
        AttachmentService::new(
            Arc::new(NoOpStorage::new("https://files.test".to_string())),
            &DisputeConfig::default(),
        )
    }

    fn upload(name: &str, mime: &str, len: usize) -> AttachmentUpload {
        AttachmentUpload {
            file_name: name.to_string(),
            content_type: mime.to_string(),
            data: Bytes::from(vec![7u8; len]),
        }
    }

    #[test]
    fn test_rejects_too_many_files() {
        let uploads = vec![
            upload("a.png", "image/png", 1),
            upload("b.png", "image/png", 1),
            upload("c.png", "image/png", 1),
            upload("d.png", "image/png", 1),
        ];
        assert!(matches!(
            service().validate(&uploads),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_disallowed_type() {
        let uploads = vec![upload("run.exe", "application/x-msdownload", 10)];
        assert!(service().validate(&uploads).is_err());
    }

    #[test]
    fn test_rejects_oversized_file() {
        let max = DisputeConfig::default().max_attachment_bytes;
        let uploads = vec![upload("big.pdf", "application/pdf", max + 1)];
        assert!(service().validate(&uploads).is_err());
    }

    #[tokio::test]
    async fn test_store_returns_attachment_metadata() {
        let stored = service()
            .store("d1", vec![upload("receipt.pdf", "application/pdf", 42)])
            .await
            .unwrap();

        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "receipt.pdf");
        assert_eq!(stored[0].size, 42);
        assert!(stored[0].url.starts_with("https://files.test/disputes/d1/"));
        assert!(stored[0].key.starts_with("disputes/d1/"));
    }

    #[tokio::test]
    async fn test_discard_deletes_stored_files() {
        let storage = Arc::new(testing::RecordingStorage::default());
        let service = AttachmentService::new(storage.clone(), &DisputeConfig::default());

        let stored = service
            .store("d1", vec![upload("a.png", "image/png", 3), upload("b.pdf", "application/pdf", 5)])
            .await
            .unwrap();
        service.discard(&stored).await;

        assert_eq!(storage.deleted(), storage.uploaded());
        assert_eq!(storage.deleted().len(), 2);
    }

    #[test]
    fn test_storage_key_is_not_serialized() {
        let attachment = Attachment {
            name: "a.png".to_string(),
            mime: "image/png".to_string(),
            size: 3,
            url: "https://files.test/disputes/d1/a.png".to_string(),
            key: "disputes/d1/a.png".to_string(),
        };
        let json = serde_json::to_value(&attachment).unwrap();
        assert!(json.get("key").is_none());
    }
}
