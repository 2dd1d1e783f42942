//! Issue rejection log repository.

use std::sync::Arc;

use crate::entities::{IssueRejection, issue_rejection};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, QuerySelect};
use sinmungo_common::{AppError, AppResult};

/// Read access to the rejection log. Rows are written by
/// [`IssueRepository::reject`](super::IssueRepository::reject).
#[derive(Clone)]
pub struct IssueRejectionRepository {
    db: Arc<DatabaseConnection>,
}

impl IssueRejectionRepository {
    /// Create a new issue rejection repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Most recent rejections first.
    pub async fn find_recent(
        &self,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<issue_rejection::Model>> {
        IssueRejection::find()
            .order_by_desc(issue_rejection::Column::RejectedAt)
            .order_by_desc(issue_rejection::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
