//! Comment service: writing comments and rendering one-level threads.

use std::collections::{HashMap, HashSet};

use sea_orm::Set;
use serde::{Deserialize, Serialize};
use sinmungo_common::{AppError, AppResult, IdGenerator};
use sinmungo_db::{
    entities::{
        comment::{self, CommentType},
        user,
    },
    repositories::{CommentRepository, IssueRepository, SupportRepository},
};

use super::{is_admin, required_text};

/// Maximum comment length in characters.
pub const MAX_COMMENT_LENGTH: usize = 1000;

/// Ancestor walks stop after this many hops.
const MAX_ANCESTOR_DEPTH: usize = 32;

/// Ordering of top-level comments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSort {
    /// Most supported first, oldest breaking ties.
    #[default]
    Support,
    /// Newest first.
    Latest,
}

/// Input for creating a comment.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentInput {
    pub issue_id: String,
    pub content: String,
    #[serde(default)]
    pub comment_type: CommentType,
    pub parent_id: Option<String>,
}

/// A reply rendered under its top-level ancestor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentReply {
    #[serde(flatten)]
    pub comment: comment::Model,
    pub user_supported: bool,
}

/// A top-level comment with its replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: comment::Model,
    pub user_supported: bool,
    pub replies: Vec<CommentReply>,
}

/// The type a comment is stored and shown with. Replies are always general.
#[must_use]
pub fn effective_comment_type(requested: CommentType, parent_id: Option<&str>) -> CommentType {
    if parent_id.is_some() {
        CommentType::General
    } else {
        requested
    }
}

/// Arrange a flat comment list into one-level threads.
///
/// Hidden comments are dropped along with every reply beneath them. Replies to
/// replies are attached to their top-level ancestor. Pinned threads lead, the
/// rest follow `sort`; replies are oldest first.
#[must_use]
pub fn build_thread(
    comments: Vec<comment::Model>,
    sort: CommentSort,
    supported: &HashSet<String>,
) -> Vec<CommentThread> {
    let by_id: HashMap<&str, &comment::Model> =
        comments.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut roots: Vec<CommentThread> = Vec::new();
    let mut replies: HashMap<String, Vec<CommentReply>> = HashMap::new();

    for c in &comments {
        if c.is_hidden {
            continue;
        }
        if c.parent_id.is_none() {
            roots.push(CommentThread {
                comment: c.clone(),
                user_supported: supported.contains(&c.id),
                replies: Vec::new(),
            });
            continue;
        }
        let Some(root_id) = visible_root(c, &by_id) else {
            continue;
        };
        let mut reply = c.clone();
        reply.comment_type = effective_comment_type(reply.comment_type, reply.parent_id.as_deref());
        replies.entry(root_id.to_string()).or_default().push(CommentReply {
            user_supported: supported.contains(&reply.id),
            comment: reply,
        });
    }

    roots.sort_by(|a, b| {
        let (a, b) = (&a.comment, &b.comment);
        b.is_pinned.cmp(&a.is_pinned).then_with(|| match sort {
            CommentSort::Support => b
                .support_count
                .cmp(&a.support_count)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id)),
            CommentSort::Latest => b
                .created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id)),
        })
    });

    for root in &mut roots {
        if let Some(mut list) = replies.remove(&root.comment.id) {
            list.sort_by(|a, b| {
                a.comment
                    .created_at
                    .cmp(&b.comment.created_at)
                    .then_with(|| a.comment.id.cmp(&b.comment.id))
            });
            root.replies = list;
        }
    }

    roots
}

/// Walk up to the top-level ancestor, giving up on hidden or missing links.
fn visible_root<'a>(
    reply: &'a comment::Model,
    by_id: &HashMap<&str, &'a comment::Model>,
) -> Option<&'a str> {
    let mut current = reply;
    for _ in 0..MAX_ANCESTOR_DEPTH {
        let Some(parent_id) = current.parent_id.as_deref() else {
            return Some(current.id.as_str());
        };
        let parent = *by_id.get(parent_id)?;
        if parent.is_hidden {
            return None;
        }
        current = parent;
    }
    None
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    issue_repo: IssueRepository,
    support_repo: SupportRepository,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(
        comment_repo: CommentRepository,
        issue_repo: IssueRepository,
        support_repo: SupportRepository,
    ) -> Self {
        Self {
            comment_repo,
            issue_repo,
            support_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Post a comment or reply on a published issue.
    pub async fn create(
        &self,
        author: &user::Model,
        input: CreateCommentInput,
    ) -> AppResult<comment::Model> {
        let content = required_text("content", &input.content, MAX_COMMENT_LENGTH)?;

        if input.comment_type == CommentType::OperatorComment && !author.is_admin {
            return Err(AppError::Forbidden(
                "Only operators can post operator comments".to_string(),
            ));
        }

        let issue = self.issue_repo.get_by_id(&input.issue_id).await?;
        if !issue.is_published {
            return Err(AppError::IssueNotFound(issue.id));
        }

        if let Some(parent_id) = input.parent_id.as_deref() {
            let parent = self.comment_repo.get_by_id(parent_id).await?;
            if parent.issue_id != issue.id {
                return Err(AppError::BadRequest(
                    "Parent comment belongs to another issue".to_string(),
                ));
            }
        }

        let comment_type = effective_comment_type(input.comment_type, input.parent_id.as_deref());

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            issue_id: Set(issue.id),
            user_id: Set(author.id.clone()),
            parent_id: Set(input.parent_id),
            content: Set(content),
            comment_type: Set(comment_type),
            support_count: Set(0),
            is_pinned: Set(false),
            is_hidden: Set(false),
            created_at: Set(chrono::Utc::now().into()),
        };

        self.comment_repo.create(model).await
    }

    /// Visible comments of an issue as one-level threads.
    ///
    /// Non-admins only see threads of published issues.
    pub async fn list(
        &self,
        issue_id: &str,
        sort: CommentSort,
        viewer: Option<&user::Model>,
    ) -> AppResult<Vec<CommentThread>> {
        let issue = self.issue_repo.get_by_id(issue_id).await?;
        if !issue.is_published && !is_admin(viewer) {
            return Err(AppError::IssueNotFound(issue.id));
        }
        self.thread_for(issue_id, sort, viewer).await
    }

    /// Build the thread without checking the issue's visibility.
    pub(crate) async fn thread_for(
        &self,
        issue_id: &str,
        sort: CommentSort,
        viewer: Option<&user::Model>,
    ) -> AppResult<Vec<CommentThread>> {
        let comments = self.comment_repo.find_by_issue(issue_id).await?;

        let supported: HashSet<String> = match viewer {
            Some(user) => {
                let ids: Vec<String> = comments
                    .iter()
                    .filter(|c| !c.is_hidden)
                    .map(|c| c.id.clone())
                    .collect();
                self.support_repo
                    .supported_comment_ids(&user.id, &ids)
                    .await?
                    .into_iter()
                    .collect()
            }
            None => HashSet::new(),
        };

        Ok(build_thread(comments, sort, &supported))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support;
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn at(c: comment::Model, minutes: i64) -> comment::Model {
        comment::Model {
            created_at: (Utc::now() - Duration::minutes(100 - minutes)).into(),
            ..c
        }
    }

    fn ids(threads: &[CommentThread]) -> Vec<&str> {
        threads.iter().map(|t| t.comment.id.as_str()).collect()
    }

    #[test]
    fn test_effective_comment_type() {
        assert_eq!(
            effective_comment_type(CommentType::LegalOpinion, Some("p")),
            CommentType::General
        );
        assert_eq!(
            effective_comment_type(CommentType::LegalOpinion, None),
            CommentType::LegalOpinion
        );
    }

    #[test]
    fn test_build_thread_flattens_deep_replies() {
        let comments = vec![
            at(test_support::comment("a", "i1", None), 1),
            at(test_support::comment("b", "i1", Some("a")), 2),
            at(test_support::comment("c", "i1", Some("b")), 3),
        ];

        let threads = build_thread(comments, CommentSort::Latest, &HashSet::new());
        assert_eq!(ids(&threads), vec!["a"]);
        let reply_ids: Vec<&str> = threads[0]
            .replies
            .iter()
            .map(|r| r.comment.id.as_str())
            .collect();
        assert_eq!(reply_ids, vec!["b", "c"]);
    }

    #[test]
    fn test_build_thread_drops_replies_under_hidden() {
        let mut hidden_root = at(test_support::comment("a", "i1", None), 1);
        hidden_root.is_hidden = true;
        let mut hidden_reply = at(test_support::comment("c", "i1", Some("b")), 3);
        hidden_reply.is_hidden = true;
        let comments = vec![
            hidden_root,
            at(test_support::comment("a2", "i1", Some("a")), 2),
            at(test_support::comment("b", "i1", None), 2),
            hidden_reply,
            at(test_support::comment("d", "i1", Some("c")), 4),
            at(test_support::comment("e", "i1", Some("b")), 5),
        ];

        let threads = build_thread(comments, CommentSort::Support, &HashSet::new());
        assert_eq!(ids(&threads), vec!["b"]);
        assert_eq!(threads[0].replies.len(), 1);
        assert_eq!(threads[0].replies[0].comment.id, "e");
    }

    #[test]
    fn test_build_thread_pinned_first_then_support() {
        let mut low = at(test_support::comment("low", "i1", None), 1);
        low.support_count = 1;
        let mut high = at(test_support::comment("high", "i1", None), 2);
        high.support_count = 9;
        let mut pinned = at(test_support::comment("pinned", "i1", None), 3);
        pinned.is_pinned = true;
        let mut tie = at(test_support::comment("tie", "i1", None), 4);
        tie.support_count = 1;

        let threads = build_thread(
            vec![low, high, pinned, tie],
            CommentSort::Support,
            &HashSet::new(),
        );
        assert_eq!(ids(&threads), vec!["pinned", "high", "low", "tie"]);
    }

    #[test]
    fn test_build_thread_latest_and_supported_flag() {
        let comments = vec![
            at(test_support::comment("old", "i1", None), 1),
            at(test_support::comment("new", "i1", None), 5),
        ];
        let supported: HashSet<String> = ["old".to_string()].into_iter().collect();

        let threads = build_thread(comments, CommentSort::Latest, &supported);
        assert_eq!(ids(&threads), vec!["new", "old"]);
        assert!(!threads[0].user_supported);
        assert!(threads[1].user_supported);
    }

    #[test]
    fn test_reply_type_is_shown_as_general() {
        let mut reply = at(test_support::comment("b", "i1", Some("a")), 2);
        reply.comment_type = CommentType::LegalOpinion;
        let comments = vec![at(test_support::comment("a", "i1", None), 1), reply];

        let threads = build_thread(comments, CommentSort::Support, &HashSet::new());
        assert_eq!(
            threads[0].replies[0].comment.comment_type,
            CommentType::General
        );
    }

    fn service(db: MockDatabase) -> CommentService {
        let db = Arc::new(db.into_connection());
        CommentService::new(
            CommentRepository::new(db.clone()),
            IssueRepository::new(db.clone()),
            SupportRepository::new(db),
        )
    }

    fn input(parent_id: Option<&str>, comment_type: CommentType) -> CreateCommentInput {
        CreateCommentInput {
            issue_id: "i1".to_string(),
            content: "  법리상 문제가 있습니다  ".to_string(),
            comment_type,
            parent_id: parent_id.map(ToString::to_string),
        }
    }

    async fn inserted_comment(
        parent: Option<comment::Model>,
        comment_type: CommentType,
    ) -> Vec<sea_orm::Value> {
        let parent_id = parent.as_ref().map(|p| p.id.clone());
        let mut db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_support::issue("i1", true)]]);
        if let Some(parent) = parent {
            db = db.append_query_results([[parent]]);
        }
        let db = db.append_query_results([[test_support::comment("c2", "i1", None)]]);
        let conn = Arc::new(db.into_connection());
        let comments = CommentService::new(
            CommentRepository::new(conn.clone()),
            IssueRepository::new(conn.clone()),
            SupportRepository::new(conn.clone()),
        );

        comments
            .create(
                &test_support::user("u1", false),
                input(parent_id.as_deref(), comment_type),
            )
            .await
            .unwrap();
        drop(comments);

        let statements = test_support::recorded_statements(conn);
        let mut inserts = test_support::inserted_values(&statements, "comment");
        assert_eq!(inserts.len(), 1);
        inserts.remove(0)
    }

    #[tokio::test]
    async fn test_create_reply_is_stored_as_general() {
        let parent = test_support::comment("c1", "i1", None);
        let values = inserted_comment(Some(parent), CommentType::LegalOpinion).await;

        assert!(values.contains(&test_support::text("일반")));
        assert!(!values.contains(&test_support::text("법률의견")));
        assert!(values.contains(&test_support::text("법리상 문제가 있습니다")));
    }

    #[tokio::test]
    async fn test_create_top_level_keeps_requested_type() {
        let values = inserted_comment(None, CommentType::LegalOpinion).await;

        assert!(values.contains(&test_support::text("법률의견")));
        assert!(!values.contains(&test_support::text("일반")));
    }

    #[tokio::test]
    async fn test_create_rejects_parent_from_other_issue() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_support::issue("i1", true)]])
            .append_query_results([[test_support::comment("c1", "other", None)]]);

        let result = service(db)
            .create(
                &test_support::user("u1", false),
                input(Some("c1"), CommentType::General),
            )
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_create_operator_comment_requires_admin() {
        let db = MockDatabase::new(DatabaseBackend::Postgres);
        let result = service(db)
            .create(
                &test_support::user("u1", false),
                input(None, CommentType::OperatorComment),
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_create_on_unpublished_issue_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_support::issue("i1", false)]]);
        let result = service(db)
            .create(
                &test_support::user("u1", false),
                input(None, CommentType::FactSupplement),
            )
            .await;
        assert!(matches!(result, Err(AppError::IssueNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_and_long_content() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));
        let user = test_support::user("u1", false);

        let mut blank = input(None, CommentType::General);
        blank.content = "   ".to_string();
        assert!(matches!(
            service.create(&user, blank).await,
            Err(AppError::Validation(_))
        ));

        let mut long = input(None, CommentType::General);
        long.content = "가".repeat(MAX_COMMENT_LENGTH + 1);
        assert!(matches!(
            service.create(&user, long).await,
            Err(AppError::Validation(_))
        ));
    }
}
