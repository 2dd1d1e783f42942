//! Attachment repository.

use std::sync::Arc;

use crate::entities::{Attachment, Issue, attachment, issue};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use sinmungo_common::{AppError, AppResult};

/// Attachment repository for database operations.
#[derive(Clone)]
pub struct AttachmentRepository {
    db: Arc<DatabaseConnection>,
}

impl AttachmentRepository {
    /// Create a new attachment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an attachment by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<attachment::Model>> {
        Attachment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get an attachment by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<attachment::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Attachment: {id}")))
    }

    /// Create a new attachment record.
    pub async fn create(&self, model: attachment::ActiveModel) -> AppResult<attachment::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete an attachment record.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Attachment::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Attachments of an issue, oldest first.
    pub async fn find_by_issue(
        &self,
        issue_id: &str,
        include_unapproved: bool,
    ) -> AppResult<Vec<attachment::Model>> {
        let mut query = Attachment::find().filter(attachment::Column::IssueId.eq(issue_id));

        if !include_unapproved {
            query = query.filter(attachment::Column::IsApproved.eq(true));
        }

        query
            .order_by_asc(attachment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Unapproved attachments with their issue, newest first.
    pub async fn find_pending_with_issue(
        &self,
    ) -> AppResult<Vec<(attachment::Model, Option<issue::Model>)>> {
        Attachment::find()
            .filter(attachment::Column::IsApproved.eq(false))
            .find_also_related(Issue)
            .order_by_desc(attachment::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark an attachment approved.
    pub async fn approve(&self, model: attachment::Model) -> AppResult<attachment::Model> {
        let mut active: attachment::ActiveModel = model.into();
        active.is_approved = Set(true);
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count unapproved attachments.
    pub async fn count_pending(&self) -> AppResult<u64> {
        Attachment::find()
            .filter(attachment::Column::IsApproved.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::attachment::AttachmentFileType;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_attachment(id: &str, is_approved: bool) -> attachment::Model {
        attachment::Model {
            id: id.to_string(),
            issue_id: "i1".to_string(),
            uploader_id: "u1".to_string(),
            file_type: AttachmentFileType::Judgment,
            original_name: "판결문.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size: 1024,
            storage_key: "i1/1_판결문.pdf".to_string(),
            file_url: "/files/i1/1.pdf?expires=1&signature=ab".to_string(),
            is_approved,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<attachment::Model>::new()])
                .into_connection(),
        );

        let repo = AttachmentRepository::new(db);
        assert!(matches!(
            repo.get_by_id("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_approve_sets_flag() {
        let pending = create_test_attachment("a1", false);
        let approved = create_test_attachment("a1", true);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[approved]])
                .into_connection(),
        );

        let repo = AttachmentRepository::new(db);
        let result = repo.approve(pending).await.unwrap();
        assert!(result.is_approved);
    }

    #[tokio::test]
    async fn test_find_by_issue_public() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_attachment("a1", true)]])
                .into_connection(),
        );

        let repo = AttachmentRepository::new(db);
        let result = repo.find_by_issue("i1", false).await.unwrap();
        assert_eq!(result.len(), 1);
        assert!(result[0].is_approved);
    }
}
