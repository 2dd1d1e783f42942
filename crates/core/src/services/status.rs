//! Status service: admin-driven workflow transitions and their history.

use std::sync::Arc;

use sea_orm::Set;
use serde::Deserialize;
use sinmungo_common::{AppError, AppResult, IdGenerator};
use sinmungo_db::{
    entities::{
        issue::{self, Conclusion, IssueStatus},
        status_history, user,
    },
    repositories::{IssueRepository, StatusHistoryRepository, TransitionPlan},
};

use super::{is_admin, require_admin, transition_policy::TransitionPolicy};

/// Maximum length of a transition note.
pub const MAX_NOTE_LENGTH: usize = 1000;

/// Input for changing an issue's status.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeStatusInput {
    pub issue_id: String,
    pub status: IssueStatus,
    pub note: Option<String>,
    pub conclusion: Option<Conclusion>,
}

/// Build a history row.
pub(crate) fn history_entry(
    id: String,
    issue_id: &str,
    from: Option<IssueStatus>,
    to: IssueStatus,
    note: Option<String>,
    changed_by: &str,
) -> status_history::ActiveModel {
    status_history::ActiveModel {
        id: Set(id),
        issue_id: Set(issue_id.to_string()),
        from_status: Set(from),
        to_status: Set(to),
        note: Set(note),
        changed_by: Set(Some(changed_by.to_string())),
        changed_at: Set(chrono::Utc::now().into()),
    }
}

/// Status service for business logic.
#[derive(Clone)]
pub struct StatusService {
    issue_repo: IssueRepository,
    history_repo: StatusHistoryRepository,
    policy: Arc<dyn TransitionPolicy>,
    id_gen: IdGenerator,
}

impl StatusService {
    /// Create a new status service.
    #[must_use]
    pub fn new(
        issue_repo: IssueRepository,
        history_repo: StatusHistoryRepository,
        policy: Arc<dyn TransitionPolicy>,
    ) -> Self {
        Self {
            issue_repo,
            history_repo,
            policy,
            id_gen: IdGenerator::new(),
        }
    }

    /// Move a published issue to `input.status` and log the transition.
    pub async fn change_status(
        &self,
        admin: &user::Model,
        input: ChangeStatusInput,
    ) -> AppResult<(issue::Model, status_history::Model)> {
        require_admin(admin)?;

        if input.conclusion.is_some() && input.status != IssueStatus::Concluded {
            return Err(AppError::BadRequest(
                "A conclusion requires the concluded status".to_string(),
            ));
        }

        let note = input
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(ToString::to_string);
        if note
            .as_ref()
            .is_some_and(|n| n.chars().count() > MAX_NOTE_LENGTH)
        {
            return Err(AppError::Validation(format!(
                "note must be at most {MAX_NOTE_LENGTH} characters"
            )));
        }

        let policy = self.policy.as_ref();
        let history_id = self.id_gen.generate();
        let target = input.status;
        let conclusion = input.conclusion;

        let (issue, entry) = self
            .issue_repo
            .transition(&input.issue_id, |current| {
                if !current.is_published {
                    return Err(AppError::BadRequest(
                        "Issue has not been approved yet".to_string(),
                    ));
                }
                policy.check(current.status, target)?;

                let mut active: issue::ActiveModel = current.clone().into();
                active.status = Set(target);
                if target == IssueStatus::Concluded {
                    if conclusion.is_some() {
                        active.conclusion = Set(conclusion);
                    }
                } else if current.conclusion.is_some() {
                    active.conclusion = Set(None);
                }
                active.updated_at = Set(Some(chrono::Utc::now().into()));

                Ok(Some(TransitionPlan {
                    issue: active,
                    history: history_entry(
                        history_id,
                        &current.id,
                        Some(current.status),
                        target,
                        note,
                        &admin.id,
                    ),
                }))
            })
            .await?;

        let entry = entry.ok_or_else(|| {
            AppError::Internal("Status transition produced no history entry".to_string())
        })?;

        tracing::info!(
            issue_id = %issue.id,
            from = ?entry.from_status,
            to = ?entry.to_status,
            policy = self.policy.name(),
            admin_id = %admin.id,
            "Issue status changed"
        );

        Ok((issue, entry))
    }

    /// Transition log of an issue, oldest first.
    ///
    /// Unpublished issues are only visible to admins.
    pub async fn history(
        &self,
        issue_id: &str,
        viewer: Option<&user::Model>,
    ) -> AppResult<Vec<status_history::Model>> {
        let issue = self.issue_repo.get_by_id(issue_id).await?;
        if !issue.is_published && !is_admin(viewer) {
            return Err(AppError::IssueNotFound(issue.id));
        }
        self.history_repo.find_by_issue(issue_id).await
    }
}
