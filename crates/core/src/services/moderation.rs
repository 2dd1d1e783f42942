//! Moderation service: the admin queue for issues, attachments, reports and comments.

use std::collections::HashMap;

use sea_orm::{Iterable, Set};
use serde::{Deserialize, Serialize};
use sinmungo_common::{AppError, AppResult, IdGenerator};
use sinmungo_db::{
    entities::{
        attachment, comment,
        issue::{self, IssueStatus},
        issue_rejection,
        report::{self, ReportStatus},
        user,
    },
    repositories::{
        AttachmentRepository, CommentRepository, IssueRejectionRepository, IssueRepository,
        ReportRepository, TransitionPlan, UserRepository,
    },
};

use super::{issue::IssuePage, paginate, require_admin, required_text, status::history_entry};

/// Note written on the history entry created by approval.
pub const APPROVAL_NOTE: &str = "관리자 검토 완료 - 공개";

/// Maximum length of a report or rejection reason.
pub const MAX_REASON_LENGTH: usize = 1000;

/// Input for reporting an issue.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportInput {
    pub issue_id: String,
    pub reason: String,
}

/// An unapproved attachment with the title of its issue.
#[derive(Debug, Clone, Serialize)]
pub struct PendingAttachment {
    #[serde(flatten)]
    pub attachment: attachment::Model,
    pub issue_title: Option<String>,
}

/// An open report with the issue title and reporter nickname.
#[derive(Debug, Clone, Serialize)]
pub struct OpenReport {
    #[serde(flatten)]
    pub report: report::Model,
    pub issue_title: Option<String>,
    pub reporter_nickname: Option<String>,
}

/// Issue count for one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: IssueStatus,
    pub count: u64,
}

/// Pending issue count for one field category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub field_category: String,
    pub count: u64,
}

/// Numbers shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_issues: u64,
    pub pending_approval: u64,
    pub pending_attachments: u64,
    pub pending_reports: u64,
    /// Every status, in workflow order, zero when empty.
    pub by_status: Vec<StatusCount>,
    pub pending_by_category: Vec<CategoryCount>,
}

/// Moderation service for business logic.
#[derive(Clone)]
pub struct ModerationService {
    issue_repo: IssueRepository,
    rejection_repo: IssueRejectionRepository,
    attachment_repo: AttachmentRepository,
    report_repo: ReportRepository,
    comment_repo: CommentRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl ModerationService {
    /// Create a new moderation service.
    #[must_use]
    pub const fn new(
        issue_repo: IssueRepository,
        rejection_repo: IssueRejectionRepository,
        attachment_repo: AttachmentRepository,
        report_repo: ReportRepository,
        comment_repo: CommentRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            issue_repo,
            rejection_repo,
            attachment_repo,
            report_repo,
            comment_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    // ========== Issues ==========

    /// Issues awaiting approval, newest first.
    pub async fn list_pending_issues(&self, admin: &user::Model) -> AppResult<Vec<issue::Model>> {
        require_admin(admin)?;
        self.issue_repo.find_unpublished().await
    }

    /// Every issue, published or not, newest first.
    pub async fn list_all_issues(
        &self,
        admin: &user::Model,
        page: Option<u64>,
        per_page: Option<u64>,
    ) -> AppResult<IssuePage> {
        require_admin(admin)?;
        let (limit, offset) = paginate(page, per_page);
        let items = self.issue_repo.find_all(limit, offset).await?;
        let total = self.issue_repo.count_all().await?;
        Ok(IssuePage { items, total })
    }

    /// Publish an issue and open its history. Already published issues are returned as is.
    pub async fn approve_issue(
        &self,
        admin: &user::Model,
        issue_id: &str,
    ) -> AppResult<issue::Model> {
        require_admin(admin)?;

        let history_id = self.id_gen.generate();
        let (issue, entry) = self
            .issue_repo
            .transition(issue_id, |current| {
                if current.is_published {
                    return Ok(None);
                }

                let now = chrono::Utc::now();
                let mut active: issue::ActiveModel = current.clone().into();
                active.is_published = Set(true);
                active.published_at = Set(Some(now.into()));
                active.status = Set(IssueStatus::Received);
                active.updated_at = Set(Some(now.into()));

                Ok(Some(TransitionPlan {
                    issue: active,
                    history: history_entry(
                        history_id,
                        &current.id,
                        None,
                        IssueStatus::Received,
                        Some(APPROVAL_NOTE.to_string()),
                        &admin.id,
                    ),
                }))
            })
            .await?;

        if entry.is_some() {
            tracing::info!(issue_id = %issue.id, admin_id = %admin.id, "Issue approved");
        } else {
            tracing::debug!(issue_id = %issue.id, "Issue already published, approve skipped");
        }
        Ok(issue)
    }

    /// Log the rejection and delete the issue with everything attached to it.
    pub async fn reject_issue(
        &self,
        admin: &user::Model,
        issue_id: &str,
        reason: &str,
    ) -> AppResult<issue_rejection::Model> {
        require_admin(admin)?;
        let reason = required_text("reason", reason, MAX_REASON_LENGTH)?;

        let rejection_id = self.id_gen.generate();
        let rejection = self
            .issue_repo
            .reject(issue_id, |current| issue_rejection::ActiveModel {
                id: Set(rejection_id),
                issue_id: Set(current.id.clone()),
                author_id: Set(current.author_id.clone()),
                title: Set(current.title.clone()),
                reason: Set(reason),
                rejected_by: Set(admin.id.clone()),
                rejected_at: Set(chrono::Utc::now().into()),
            })
            .await?;

        tracing::info!(issue_id = %rejection.issue_id, admin_id = %admin.id, "Issue rejected");
        Ok(rejection)
    }

    /// Rejection log, most recent first.
    pub async fn list_rejections(
        &self,
        admin: &user::Model,
        page: Option<u64>,
        per_page: Option<u64>,
    ) -> AppResult<Vec<issue_rejection::Model>> {
        require_admin(admin)?;
        let (limit, offset) = paginate(page, per_page);
        self.rejection_repo.find_recent(limit, offset).await
    }

    // ========== Attachments ==========

    /// Unapproved attachments, newest first.
    pub async fn list_pending_attachments(
        &self,
        admin: &user::Model,
    ) -> AppResult<Vec<PendingAttachment>> {
        require_admin(admin)?;
        Ok(self
            .attachment_repo
            .find_pending_with_issue()
            .await?
            .into_iter()
            .map(|(attachment, issue)| PendingAttachment {
                attachment,
                issue_title: issue.map(|i| i.title),
            })
            .collect())
    }

    /// Make an attachment publicly visible.
    pub async fn approve_attachment(
        &self,
        admin: &user::Model,
        attachment_id: &str,
    ) -> AppResult<attachment::Model> {
        require_admin(admin)?;
        let attachment = self.attachment_repo.get_by_id(attachment_id).await?;
        if attachment.is_approved {
            return Ok(attachment);
        }

        let approved = self.attachment_repo.approve(attachment).await?;
        tracing::info!(
            attachment_id = %approved.id,
            issue_id = %approved.issue_id,
            admin_id = %admin.id,
            "Attachment approved"
        );
        Ok(approved)
    }

    // ========== Reports ==========

    /// File a report against a published issue.
    pub async fn create_report(
        &self,
        reporter: &user::Model,
        input: CreateReportInput,
    ) -> AppResult<report::Model> {
        let reason = required_text("reason", &input.reason, MAX_REASON_LENGTH)?;

        let issue = self.issue_repo.get_by_id(&input.issue_id).await?;
        if !issue.is_published {
            return Err(AppError::IssueNotFound(issue.id));
        }

        let model = report::ActiveModel {
            id: Set(self.id_gen.generate()),
            issue_id: Set(issue.id),
            reporter_id: Set(reporter.id.clone()),
            reason: Set(reason),
            status: Set(ReportStatus::UnderReview),
            resolved_by: Set(None),
            created_at: Set(chrono::Utc::now().into()),
            resolved_at: Set(None),
        };

        let report = self.report_repo.create(model).await?;
        tracing::info!(report_id = %report.id, issue_id = %report.issue_id, "Report filed");
        Ok(report)
    }

    /// Reports still under review, newest first.
    pub async fn list_open_reports(&self, admin: &user::Model) -> AppResult<Vec<OpenReport>> {
        require_admin(admin)?;
        let rows = self.report_repo.find_open_with_issue().await?;

        let mut reporter_ids: Vec<String> =
            rows.iter().map(|(r, _)| r.reporter_id.clone()).collect();
        reporter_ids.sort();
        reporter_ids.dedup();
        let nicknames: HashMap<String, Option<String>> = self
            .user_repo
            .find_by_ids(&reporter_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u.nickname))
            .collect();

        Ok(rows
            .into_iter()
            .map(|(report, issue)| OpenReport {
                reporter_nickname: nicknames.get(&report.reporter_id).cloned().flatten(),
                issue_title: issue.map(|i| i.title),
                report,
            })
            .collect())
    }

    /// Close a report. The outcome is final.
    pub async fn resolve_report(
        &self,
        admin: &user::Model,
        report_id: &str,
        outcome: ReportStatus,
    ) -> AppResult<report::Model> {
        require_admin(admin)?;

        if outcome == ReportStatus::UnderReview {
            return Err(AppError::BadRequest(
                "Outcome must be resolved or dismissed".to_string(),
            ));
        }

        let report = self.report_repo.get_by_id(report_id).await?;
        if report.status != ReportStatus::UnderReview {
            return Err(AppError::BadRequest("Report is already closed".to_string()));
        }

        let mut active: report::ActiveModel = report.into();
        active.status = Set(outcome);
        active.resolved_by = Set(Some(admin.id.clone()));
        active.resolved_at = Set(Some(chrono::Utc::now().into()));

        let report = self.report_repo.update(active).await?;
        tracing::info!(
            report_id = %report.id,
            outcome = ?report.status,
            admin_id = %admin.id,
            "Report resolved"
        );
        Ok(report)
    }

    // ========== Comments ==========

    /// Hide a comment and, on read, its replies.
    pub async fn hide_comment(
        &self,
        admin: &user::Model,
        comment_id: &str,
    ) -> AppResult<comment::Model> {
        self.set_comment_hidden(admin, comment_id, true).await
    }

    /// Undo [`Self::hide_comment`].
    pub async fn unhide_comment(
        &self,
        admin: &user::Model,
        comment_id: &str,
    ) -> AppResult<comment::Model> {
        self.set_comment_hidden(admin, comment_id, false).await
    }

    async fn set_comment_hidden(
        &self,
        admin: &user::Model,
        comment_id: &str,
        hidden: bool,
    ) -> AppResult<comment::Model> {
        require_admin(admin)?;
        let comment = self.comment_repo.get_by_id(comment_id).await?;
        if comment.is_hidden == hidden {
            return Ok(comment);
        }
        let comment = self.comment_repo.set_hidden(comment, hidden).await?;
        tracing::info!(
            comment_id = %comment.id,
            hidden,
            admin_id = %admin.id,
            "Comment visibility changed"
        );
        Ok(comment)
    }

    /// Pin or unpin a comment.
    pub async fn pin_comment(
        &self,
        admin: &user::Model,
        comment_id: &str,
        pinned: bool,
    ) -> AppResult<comment::Model> {
        require_admin(admin)?;
        let comment = self.comment_repo.get_by_id(comment_id).await?;
        if comment.is_pinned == pinned {
            return Ok(comment);
        }
        self.comment_repo.set_pinned(comment, pinned).await
    }

    // ========== Dashboard ==========

    /// Queue sizes and status distribution.
    pub async fn dashboard_stats(&self, admin: &user::Model) -> AppResult<DashboardStats> {
        require_admin(admin)?;

        let total_issues = self.issue_repo.count_all().await?;
        let pending_approval = self.issue_repo.count_unpublished().await?;
        let pending_attachments = self.attachment_repo.count_pending().await?;
        let pending_reports = self.report_repo.count_open().await?;
        let counted = self.issue_repo.count_by_status().await?;
        let categories = self.issue_repo.count_unpublished_by_category().await?;

        Ok(DashboardStats {
            total_issues,
            pending_approval,
            pending_attachments,
            pending_reports,
            by_status: zero_filled(&counted),
            pending_by_category: categories
                .into_iter()
                .map(|(field_category, count)| CategoryCount {
                    field_category,
                    count: count.max(0) as u64,
                })
                .collect(),
        })
    }
}

/// One entry per status in workflow order, missing statuses counted as zero.
fn zero_filled(counted: &[(IssueStatus, i64)]) -> Vec<StatusCount> {
    IssueStatus::iter()
        .map(|status| StatusCount {
            status,
            count: counted
                .iter()
                .find(|(s, _)| *s == status)
                .map_or(0, |(_, n)| (*n).max(0) as u64),
        })
        .collect()
}
