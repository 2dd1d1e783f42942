//! Support (upvote) repository for issues and comments.

use std::sync::Arc;

use crate::entities::{
    Comment, CommentSupport, Issue, IssueSupport, comment, comment_support, issue, issue_support,
};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait, sea_query::Expr,
};
use sinmungo_common::{AppError, AppResult};

/// State of a support relation after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportToggle {
    pub supported: bool,
    pub count: i32,
}

/// Support repository for database operations.
///
/// Every toggle runs in one transaction: the relation row and the
/// denormalized counter change together. The unique `(user, target)` index
/// makes a concurrent duplicate insert fail instead of double counting.
#[derive(Clone)]
pub struct SupportRepository {
    db: Arc<DatabaseConnection>,
}

impl SupportRepository {
    /// Create a new support repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Flip the user's support on an issue.
    pub async fn toggle_issue(
        &self,
        user_id: &str,
        issue_id: &str,
        new_id: String,
    ) -> AppResult<SupportToggle> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let existing = IssueSupport::find()
            .filter(issue_support::Column::UserId.eq(user_id))
            .filter(issue_support::Column::IssueId.eq(issue_id))
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let supported = if let Some(row) = existing {
            IssueSupport::delete_by_id(row.id)
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            Issue::update_many()
                .col_expr(
                    issue::Column::SupportCount,
                    Expr::cust("GREATEST(support_count - 1, 0)"),
                )
                .filter(issue::Column::Id.eq(issue_id))
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            false
        } else {
            IssueSupport::insert(issue_support::ActiveModel {
                id: Set(new_id),
                user_id: Set(user_id.to_string()),
                issue_id: Set(issue_id.to_string()),
                created_at: Set(Utc::now().into()),
            })
            .exec_without_returning(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

            Issue::update_many()
                .col_expr(
                    issue::Column::SupportCount,
                    Expr::col(issue::Column::SupportCount).add(1),
                )
                .filter(issue::Column::Id.eq(issue_id))
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            true
        };

        let count = Issue::find_by_id(issue_id)
            .select_only()
            .column(issue::Column::SupportCount)
            .into_tuple::<i32>()
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .unwrap_or(0);

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(SupportToggle { supported, count })
    }

    /// Flip the user's support on a comment.
    pub async fn toggle_comment(
        &self,
        user_id: &str,
        comment_id: &str,
        new_id: String,
    ) -> AppResult<SupportToggle> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let existing = CommentSupport::find()
            .filter(comment_support::Column::UserId.eq(user_id))
            .filter(comment_support::Column::CommentId.eq(comment_id))
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let supported = if let Some(row) = existing {
            CommentSupport::delete_by_id(row.id)
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            Comment::update_many()
                .col_expr(
                    comment::Column::SupportCount,
                    Expr::cust("GREATEST(support_count - 1, 0)"),
                )
                .filter(comment::Column::Id.eq(comment_id))
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            false
        } else {
            CommentSupport::insert(comment_support::ActiveModel {
                id: Set(new_id),
                user_id: Set(user_id.to_string()),
                comment_id: Set(comment_id.to_string()),
                created_at: Set(Utc::now().into()),
            })
            .exec_without_returning(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

            Comment::update_many()
                .col_expr(
                    comment::Column::SupportCount,
                    Expr::col(comment::Column::SupportCount).add(1),
                )
                .filter(comment::Column::Id.eq(comment_id))
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            true
        };

        let count = Comment::find_by_id(comment_id)
            .select_only()
            .column(comment::Column::SupportCount)
            .into_tuple::<i32>()
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .unwrap_or(0);

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(SupportToggle { supported, count })
    }

    /// Whether the user currently supports the issue.
    pub async fn has_issue_support(&self, user_id: &str, issue_id: &str) -> AppResult<bool> {
        Ok(IssueSupport::find()
            .filter(issue_support::Column::UserId.eq(user_id))
            .filter(issue_support::Column::IssueId.eq(issue_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .is_some())
    }

    /// Which of `comment_ids` the user supports.
    pub async fn supported_comment_ids(
        &self,
        user_id: &str,
        comment_ids: &[String],
    ) -> AppResult<Vec<String>> {
        if comment_ids.is_empty() {
            return Ok(vec![]);
        }
        CommentSupport::find()
            .filter(comment_support::Column::UserId.eq(user_id))
            .filter(comment_support::Column::CommentId.is_in(comment_ids.iter().cloned()))
            .select_only()
            .column(comment_support::Column::CommentId)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    fn count_row(n: i32) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        maplit::btreemap! {
            "support_count" => sea_orm::Value::Int(Some(n))
        }
    }

    #[tokio::test]
    async fn test_toggle_issue_adds_support() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<issue_support::Model>::new()])
                .append_exec_results([exec_ok(), exec_ok()])
                .append_query_results([[count_row(4)]])
                .into_connection(),
        );

        let repo = SupportRepository::new(db);
        let result = repo
            .toggle_issue("u1", "i1", "s1".to_string())
            .await
            .unwrap();
        assert_eq!(
            result,
            SupportToggle {
                supported: true,
                count: 4
            }
        );
    }

    #[tokio::test]
    async fn test_toggle_issue_removes_support() {
        let existing = issue_support::Model {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            issue_id: "i1".to_string(),
            created_at: Utc::now().into(),
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .append_exec_results([exec_ok(), exec_ok()])
                .append_query_results([[count_row(3)]])
                .into_connection(),
        );

        let repo = SupportRepository::new(db);
        let result = repo
            .toggle_issue("u1", "i1", "s2".to_string())
            .await
            .unwrap();
        assert!(!result.supported);
        assert_eq!(result.count, 3);
    }

    #[tokio::test]
    async fn test_toggle_comment_adds_support() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<comment_support::Model>::new()])
                .append_exec_results([exec_ok(), exec_ok()])
                .append_query_results([[count_row(1)]])
                .into_connection(),
        );

        let repo = SupportRepository::new(db);
        let result = repo
            .toggle_comment("u1", "c1", "s1".to_string())
            .await
            .unwrap();
        assert!(result.supported);
        assert_eq!(result.count, 1);
    }

    #[tokio::test]
    async fn test_supported_comment_ids_empty_input() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let repo = SupportRepository::new(db);
        assert!(
            repo.supported_comment_ids("u1", &[])
                .await
                .unwrap()
                .is_empty()
        );
    }
}
