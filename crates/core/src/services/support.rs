//! Support service: per-user endorsements of issues and comments.

use sinmungo_common::{AppError, AppResult, IdGenerator};
use sinmungo_db::{
    entities::user,
    repositories::{CommentRepository, IssueRepository, SupportRepository, SupportToggle},
};

/// Support service for business logic.
#[derive(Clone)]
pub struct SupportService {
    support_repo: SupportRepository,
    issue_repo: IssueRepository,
    comment_repo: CommentRepository,
    id_gen: IdGenerator,
}

impl SupportService {
    /// Create a new support service.
    #[must_use]
    pub const fn new(
        support_repo: SupportRepository,
        issue_repo: IssueRepository,
        comment_repo: CommentRepository,
    ) -> Self {
        Self {
            support_repo,
            issue_repo,
            comment_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Flip the user's support on a published issue.
    pub async fn toggle_issue(
        &self,
        user: &user::Model,
        issue_id: &str,
    ) -> AppResult<SupportToggle> {
        let issue = self.issue_repo.get_by_id(issue_id).await?;
        if !issue.is_published {
            return Err(AppError::IssueNotFound(issue.id));
        }

        let toggle = self
            .support_repo
            .toggle_issue(&user.id, &issue.id, self.id_gen.generate())
            .await?;
        tracing::debug!(
            issue_id = %issue.id,
            user_id = %user.id,
            supported = toggle.supported,
            "Issue support toggled"
        );
        Ok(toggle)
    }

    /// Flip the user's support on a visible comment.
    pub async fn toggle_comment(
        &self,
        user: &user::Model,
        comment_id: &str,
    ) -> AppResult<SupportToggle> {
        let comment = self.comment_repo.get_by_id(comment_id).await?;
        if comment.is_hidden {
            return Err(AppError::CommentNotFound(comment.id));
        }
        let issue = self.issue_repo.get_by_id(&comment.issue_id).await?;
        if !issue.is_published {
            return Err(AppError::CommentNotFound(comment.id));
        }

        let toggle = self
            .support_repo
            .toggle_comment(&user.id, &comment.id, self.id_gen.generate())
            .await?;
        tracing::debug!(
            comment_id = %comment.id,
            user_id = %user.id,
            supported = toggle.supported,
            "Comment support toggled"
        );
        Ok(toggle)
    }

    /// Whether `user` supports the issue.
    pub async fn has_issue_support(&self, user: &user::Model, issue_id: &str) -> AppResult<bool> {
        self.support_repo.has_issue_support(&user.id, issue_id).await
    }
}
