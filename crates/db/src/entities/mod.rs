//! Database entities.

pub mod attachment;
pub mod comment;
pub mod comment_support;
pub mod issue;
pub mod issue_rejection;
pub mod issue_support;
pub mod report;
pub mod status_history;
pub mod user;

pub use attachment::Entity as Attachment;
pub use comment::Entity as Comment;
pub use comment_support::Entity as CommentSupport;
pub use issue::Entity as Issue;
pub use issue_rejection::Entity as IssueRejection;
pub use issue_support::Entity as IssueSupport;
pub use report::Entity as Report;
pub use status_history::Entity as StatusHistory;
pub use user::Entity as User;
