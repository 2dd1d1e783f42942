//! Repository layer for database operations.

mod attachment;
mod comment;
mod issue;
mod issue_rejection;
mod report;
mod status_history;
mod support;
mod user;

pub use attachment::AttachmentRepository;
pub use comment::CommentRepository;
pub use issue::{IssueOrder, IssueRepository, IssueSearch, TransitionPlan};
pub use issue_rejection::IssueRejectionRepository;
pub use report::ReportRepository;
pub use status_history::StatusHistoryRepository;
pub use support::{SupportRepository, SupportToggle};
pub use user::UserRepository;
