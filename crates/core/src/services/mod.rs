//! Business logic services.

#![allow(missing_docs)]

pub mod attachment;
pub mod comment;
pub mod issue;
pub mod moderation;
pub mod status;
pub mod support;
pub mod transition_policy;
pub mod user;

pub use attachment::{ALLOWED_CONTENT_TYPES, AttachmentService, UploadInput, validate_upload};
pub use comment::{
    CommentReply, CommentService, CommentSort, CommentThread, CreateCommentInput, build_thread,
    effective_comment_type,
};
pub use issue::{
    IssueDetail, IssuePage, IssueService, IssueSort, ListIssuesQuery, RankingPeriod,
    SubmitIssueInput,
};
pub use moderation::{
    CategoryCount, CreateReportInput, DashboardStats, ModerationService, OpenReport,
    PendingAttachment, StatusCount,
};
pub use status::{ChangeStatusInput, StatusService};
pub use support::SupportService;
pub use transition_policy::{ForwardOnlyPolicy, PermissivePolicy, TransitionPolicy, policy_for};
pub use user::{SigninInput, SignupInput, UserService};

use sinmungo_common::{AppError, AppResult};
use sinmungo_db::entities::user as user_entity;

/// Default page size for listings.
pub const DEFAULT_PER_PAGE: u64 = 20;

/// Largest page size a caller may request.
pub const MAX_PER_PAGE: u64 = 100;

/// Resolve 1-based paging into `(limit, offset)`.
#[must_use]
pub fn paginate(page: Option<u64>, per_page: Option<u64>) -> (u64, u64) {
    let limit = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let page = page.unwrap_or(1).max(1);
    (limit, (page - 1).saturating_mul(limit))
}

/// Fail with `Forbidden` unless `user` is an admin.
pub fn require_admin(user: &user_entity::Model) -> AppResult<()> {
    if user.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin privileges required".to_string()))
    }
}

/// Whether the optional viewer is an admin.
#[must_use]
pub fn is_admin(viewer: Option<&user_entity::Model>) -> bool {
    viewer.is_some_and(|u| u.is_admin)
}

/// Trim `text` and enforce `1..=max` characters.
pub(crate) fn required_text(field: &str, text: &str, max: usize) -> AppResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    if trimmed.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_defaults_and_caps() {
        assert_eq!(paginate(None, None), (20, 0));
        assert_eq!(paginate(Some(3), Some(10)), (10, 20));
        assert_eq!(paginate(Some(0), Some(500)), (100, 0));
    }

    #[test]
    fn test_paginate_huge_page_saturates() {
        assert_eq!(paginate(Some(u64::MAX), Some(100)), (100, u64::MAX));
        assert_eq!(paginate(Some(u64::MAX), None), (20, u64::MAX));
    }

    #[test]
    fn test_required_text_counts_characters() {
        assert!(required_text("content", "   ", 10).is_err());
        assert_eq!(required_text("content", " 안녕 ", 2).unwrap(), "안녕");
        assert!(required_text("content", "안녕하세요", 4).is_err());
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&test_support::user("a", true)).is_ok());
        assert!(matches!(
            require_admin(&test_support::user("b", false)),
            Err(AppError::Forbidden(_))
        ));
    }
}
