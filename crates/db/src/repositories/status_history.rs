//! Status history repository.

use std::sync::Arc;

use crate::entities::{StatusHistory, status_history};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use sinmungo_common::{AppError, AppResult};

/// Read access to the status history log. Writes go through
/// [`IssueRepository::transition`](super::IssueRepository::transition).
#[derive(Clone)]
pub struct StatusHistoryRepository {
    db: Arc<DatabaseConnection>,
}

impl StatusHistoryRepository {
    /// Create a new status history repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Entries for an issue, oldest first.
    pub async fn find_by_issue(&self, issue_id: &str) -> AppResult<Vec<status_history::Model>> {
        StatusHistory::find()
            .filter(status_history::Column::IssueId.eq(issue_id))
            .order_by_asc(status_history::Column::ChangedAt)
            .order_by_asc(status_history::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
