//! Attachment service: evidence files stored in the blob store.

use std::{sync::Arc, time::Duration};

use sea_orm::Set;
use sinmungo_common::{
    AppError, AppResult, BlobStore, IdGenerator, StoredBlob, attachment_storage_key,
    config::StorageConfig,
};
use sinmungo_db::{
    entities::{
        attachment::{self, AttachmentFileType},
        user,
    },
    repositories::{AttachmentRepository, IssueRepository},
};

/// MIME types accepted for attachments.
pub const ALLOWED_CONTENT_TYPES: [&str; 4] =
    ["application/pdf", "image/jpeg", "image/png", "image/webp"];

/// An uploaded file on its way into storage.
#[derive(Debug, Clone)]
pub struct UploadInput {
    pub issue_id: String,
    pub file_type: AttachmentFileType,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// `image/PNG; charset=binary` -> `image/png`
fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Check size and type before anything is written.
pub fn validate_upload(size: usize, content_type: &str, max_bytes: usize) -> AppResult<()> {
    if size == 0 {
        return Err(AppError::Validation("File is empty".to_string()));
    }
    if size > max_bytes {
        return Err(AppError::Validation(format!(
            "File is {size} bytes; the limit is {max_bytes} bytes"
        )));
    }
    let normalized = normalize_content_type(content_type);
    if !ALLOWED_CONTENT_TYPES.contains(&normalized.as_str()) {
        return Err(AppError::Validation(format!(
            "Unsupported file type '{content_type}'; allowed: {}",
            ALLOWED_CONTENT_TYPES.join(", ")
        )));
    }
    Ok(())
}

/// Attachment service for business logic.
#[derive(Clone)]
pub struct AttachmentService {
    attachment_repo: AttachmentRepository,
    issue_repo: IssueRepository,
    store: Arc<dyn BlobStore>,
    id_gen: IdGenerator,
    max_upload_bytes: usize,
    signed_url_ttl: Duration,
}

impl AttachmentService {
    /// Create a new attachment service.
    #[must_use]
    pub fn new(
        attachment_repo: AttachmentRepository,
        issue_repo: IssueRepository,
        store: Arc<dyn BlobStore>,
        config: &StorageConfig,
    ) -> Self {
        Self {
            attachment_repo,
            issue_repo,
            store,
            id_gen: IdGenerator::new(),
            max_upload_bytes: config.max_upload_bytes,
            signed_url_ttl: Duration::from_secs(config.signed_url_ttl_secs),
        }
    }

    /// Largest accepted upload in bytes.
    #[must_use]
    pub const fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Store a file and record it as pending approval.
    ///
    /// The blob is written first. If signing or the insert fails afterwards the
    /// blob is deleted again before the error is returned.
    pub async fn upload(
        &self,
        uploader: &user::Model,
        input: UploadInput,
    ) -> AppResult<attachment::Model> {
        validate_upload(input.data.len(), &input.content_type, self.max_upload_bytes)?;
        let content_type = normalize_content_type(&input.content_type);

        let issue = self.issue_repo.get_by_id(&input.issue_id).await?;

        let key = attachment_storage_key(
            &issue.id,
            chrono::Utc::now().timestamp_millis(),
            &input.file_name,
        );
        let blob = self.store.upload(&key, &input.data, &content_type).await?;

        match self.record(uploader, &input, &blob).await {
            Ok(attachment) => {
                tracing::info!(
                    attachment_id = %attachment.id,
                    issue_id = %attachment.issue_id,
                    size = attachment.size,
                    "Attachment uploaded"
                );
                Ok(attachment)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    key = %blob.key,
                    "Upload failed after blob write, removing blob"
                );
                if let Err(cleanup) = self.store.delete(&blob.key).await {
                    tracing::warn!(
                        error = %cleanup,
                        key = %blob.key,
                        "Failed to remove orphaned blob"
                    );
                }
                Err(e)
            }
        }
    }

    async fn record(
        &self,
        uploader: &user::Model,
        input: &UploadInput,
        blob: &StoredBlob,
    ) -> AppResult<attachment::Model> {
        let file_url = self.store.signed_url(&blob.key, self.signed_url_ttl).await?;

        let model = attachment::ActiveModel {
            id: Set(self.id_gen.generate()),
            issue_id: Set(input.issue_id.clone()),
            uploader_id: Set(uploader.id.clone()),
            file_type: Set(input.file_type),
            original_name: Set(input.file_name.clone()),
            content_type: Set(blob.content_type.clone()),
            size: Set(blob.size as i64),
            storage_key: Set(blob.key.clone()),
            file_url: Set(file_url),
            is_approved: Set(false),
            created_at: Set(chrono::Utc::now().into()),
        };

        self.attachment_repo.create(model).await
    }

    /// Delete an unapproved attachment. Only its uploader or the issue's author may.
    pub async fn delete(&self, user: &user::Model, attachment_id: &str) -> AppResult<()> {
        let attachment = self.attachment_repo.get_by_id(attachment_id).await?;

        if attachment.is_approved {
            return Err(AppError::Forbidden(
                "Approved attachments cannot be deleted".to_string(),
            ));
        }

        let is_uploader = attachment.uploader_id == user.id;
        let is_issue_author = match self.issue_repo.find_by_id(&attachment.issue_id).await? {
            Some(issue) => issue.author_id == user.id,
            None => false,
        };
        if !is_uploader && !is_issue_author {
            return Err(AppError::Forbidden(
                "Not allowed to delete this attachment".to_string(),
            ));
        }

        self.attachment_repo.delete(&attachment.id).await?;

        if let Err(e) = self.store.delete(&attachment.storage_key).await {
            tracing::warn!(
                error = %e,
                key = %attachment.storage_key,
                "Failed to delete attachment blob"
            );
        }

        tracing::info!(attachment_id = %attachment.id, user_id = %user.id, "Attachment deleted");
        Ok(())
    }

    /// Attachments of an issue. Public reads pass `include_unapproved = false`
    /// and only see attachments of published issues.
    pub async fn list_for_issue(
        &self,
        issue_id: &str,
        include_unapproved: bool,
    ) -> AppResult<Vec<attachment::Model>> {
        let issue = self.issue_repo.get_by_id(issue_id).await?;
        if !issue.is_published && !include_unapproved {
            return Err(AppError::IssueNotFound(issue.id));
        }
        self.attachment_repo
            .find_by_issue(issue_id, include_unapproved)
            .await
    }
}
