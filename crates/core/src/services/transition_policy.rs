//! Rules for which issue status may follow which.

use std::sync::Arc;

use sinmungo_common::{AppError, AppResult, config::TransitionPolicyKind};
use sinmungo_db::entities::issue::IssueStatus;

/// Decides whether an admin may move an issue between two statuses.
pub trait TransitionPolicy: Send + Sync {
    /// `Ok(())` when `from -> to` is allowed, `BadRequest` otherwise.
    fn check(&self, from: IssueStatus, to: IssueStatus) -> AppResult<()>;

    /// Name used in logs.
    fn name(&self) -> &'static str;
}

/// Any status may follow any other, including itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissivePolicy;

impl TransitionPolicy for PermissivePolicy {
    fn check(&self, _from: IssueStatus, _to: IssueStatus) -> AppResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "permissive"
    }
}

/// Moves must go forward along the workflow. Concluded issues may be reopened.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardOnlyPolicy;

impl TransitionPolicy for ForwardOnlyPolicy {
    fn check(&self, from: IssueStatus, to: IssueStatus) -> AppResult<()> {
        if to.ordinal() > from.ordinal() || is_reopen(from, to) {
            return Ok(());
        }
        Err(AppError::BadRequest(format!(
            "Status cannot move from {} to {}",
            label(from),
            label(to)
        )))
    }

    fn name(&self) -> &'static str {
        "forward_only"
    }
}

/// `Concluded -> Received` reopens a case.
#[must_use]
pub fn is_reopen(from: IssueStatus, to: IssueStatus) -> bool {
    from == IssueStatus::Concluded && to == IssueStatus::Received
}

/// Build the policy selected in configuration.
#[must_use]
pub fn policy_for(kind: TransitionPolicyKind) -> Arc<dyn TransitionPolicy> {
    match kind {
        TransitionPolicyKind::Permissive => Arc::new(PermissivePolicy),
        TransitionPolicyKind::ForwardOnly => Arc::new(ForwardOnlyPolicy),
    }
}

const fn label(status: IssueStatus) -> &'static str {
    match status {
        IssueStatus::Received => "접수됨",
        IssueStatus::UnderReview => "검토중",
        IssueStatus::PublicDiscussion => "공론화",
        IssueStatus::ForwardedToAgency => "기관전달",
        IssueStatus::Concluded => "종결",
    }
}
