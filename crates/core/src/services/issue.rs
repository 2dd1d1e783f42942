//! Issue service: citizen submission and the public read paths.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use sinmungo_common::{AppError, AppResult, IdGenerator};
use sinmungo_db::{
    entities::{
        attachment,
        issue::{self, Agency, IssueStatus},
        status_history, user,
    },
    repositories::{
        AttachmentRepository, IssueOrder, IssueRepository, IssueSearch, StatusHistoryRepository,
        SupportRepository,
    },
};
use validator::{Validate, ValidationError};

use super::{
    DEFAULT_PER_PAGE, MAX_PER_PAGE,
    comment::{CommentService, CommentSort, CommentThread},
    is_admin, paginate,
};

/// How far back the trending sort looks.
pub const TRENDING_WINDOW_DAYS: i64 = 7;

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank").with_message("must not be blank".into()))
    } else {
        Ok(())
    }
}

/// Input for submitting an issue.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitIssueInput {
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub title: String,

    #[validate(custom(function = "not_blank"))]
    pub summary: String,

    #[validate(length(max = 64), custom(function = "not_blank"))]
    pub enforcement_type: String,

    #[validate(length(max = 64), custom(function = "not_blank"))]
    pub field_category: String,

    #[validate(length(max = 64), custom(function = "not_blank"))]
    pub region: String,

    pub occurred_at: NaiveDate,

    #[validate(custom(function = "not_blank"))]
    pub content_overview: String,

    #[validate(custom(function = "not_blank"))]
    pub content_problem: String,

    #[validate(custom(function = "not_blank"))]
    pub content_common_sense: String,

    pub content_comparison: Option<String>,

    pub content_status: Option<String>,

    #[serde(default)]
    pub request_types: Vec<String>,

    #[serde(default)]
    pub agencies: Vec<Agency>,
}

/// Ordering of the public listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSort {
    #[default]
    Latest,
    Support,
    /// Most supported among the last week's publications.
    Trending,
}

/// Filters and paging for the public listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListIssuesQuery {
    pub enforcement_type: Option<String>,
    pub field_category: Option<String>,
    pub region: Option<String>,
    pub status: Option<IssueStatus>,
    pub q: Option<String>,
    #[serde(default)]
    pub sort: IssueSort,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// One page of issues plus the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct IssuePage {
    pub items: Vec<issue::Model>,
    pub total: u64,
}

/// Time window of the support ranking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingPeriod {
    #[default]
    Weekly,
    Monthly,
    All,
}

impl RankingPeriod {
    /// Earliest publication instant inside the window, `None` for all time.
    #[must_use]
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Weekly => Some(now - Duration::days(7)),
            Self::Monthly => Some(now - Duration::days(30)),
            Self::All => None,
        }
    }
}

/// An issue with everything its detail page shows.
#[derive(Debug, Clone, Serialize)]
pub struct IssueDetail {
    pub issue: issue::Model,
    pub attachments: Vec<attachment::Model>,
    pub comments: Vec<CommentThread>,
    pub history: Vec<status_history::Model>,
    pub user_supported: bool,
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Issue service for business logic.
#[derive(Clone)]
pub struct IssueService {
    issue_repo: IssueRepository,
    attachment_repo: AttachmentRepository,
    history_repo: StatusHistoryRepository,
    support_repo: SupportRepository,
    comments: CommentService,
    id_gen: IdGenerator,
}

impl IssueService {
    /// Create a new issue service.
    #[must_use]
    pub const fn new(
        issue_repo: IssueRepository,
        attachment_repo: AttachmentRepository,
        history_repo: StatusHistoryRepository,
        support_repo: SupportRepository,
        comments: CommentService,
    ) -> Self {
        Self {
            issue_repo,
            attachment_repo,
            history_repo,
            support_repo,
            comments,
            id_gen: IdGenerator::new(),
        }
    }

    /// Submit an issue. It stays out of public view until an admin approves it.
    pub async fn submit(
        &self,
        author: &user::Model,
        input: SubmitIssueInput,
    ) -> AppResult<issue::Model> {
        input.validate()?;

        let request_types: Vec<String> = input
            .request_types
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        let model = issue::ActiveModel {
            id: Set(self.id_gen.generate()),
            author_id: Set(author.id.clone()),
            title: Set(input.title.trim().to_string()),
            summary: Set(input.summary.trim().to_string()),
            enforcement_type: Set(input.enforcement_type.trim().to_string()),
            field_category: Set(input.field_category.trim().to_string()),
            region: Set(input.region.trim().to_string()),
            occurred_at: Set(input.occurred_at),
            content_overview: Set(input.content_overview),
            content_problem: Set(input.content_problem),
            content_common_sense: Set(input.content_common_sense),
            content_comparison: Set(optional_text(input.content_comparison)),
            content_status: Set(optional_text(input.content_status)),
            request_types: Set(serde_json::json!(request_types)),
            agencies: Set(serde_json::to_value(&input.agencies)
                .map_err(|e| AppError::Internal(e.to_string()))?),
            status: Set(IssueStatus::Received),
            conclusion: Set(None),
            is_published: Set(false),
            published_at: Set(None),
            support_count: Set(0),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let issue = self.issue_repo.create(model).await?;
        tracing::info!(issue_id = %issue.id, author_id = %author.id, "Issue submitted");
        Ok(issue)
    }

    /// Published issues matching `query`.
    pub async fn list_published(&self, query: ListIssuesQuery) -> AppResult<IssuePage> {
        let (limit, offset) = paginate(query.page, query.per_page);

        let mut search = IssueSearch {
            enforcement_type: query.enforcement_type,
            field_category: query.field_category,
            region: query.region,
            status: query.status,
            query: query.q,
            published_since: None,
        };
        let order = match query.sort {
            IssueSort::Latest => IssueOrder::Latest,
            IssueSort::Support => IssueOrder::Support,
            IssueSort::Trending => {
                search.published_since = Some(Utc::now() - Duration::days(TRENDING_WINDOW_DAYS));
                IssueOrder::Support
            }
        };

        let items = self
            .issue_repo
            .search_published(&search, order, limit, offset)
            .await?;
        let total = self.issue_repo.count_published(&search).await?;

        Ok(IssuePage { items, total })
    }

    /// Issue detail. Unpublished issues are only visible to admins.
    pub async fn get_issue(
        &self,
        issue_id: &str,
        viewer: Option<&user::Model>,
    ) -> AppResult<IssueDetail> {
        let issue = self.issue_repo.get_by_id(issue_id).await?;
        let admin = is_admin(viewer);
        if !issue.is_published && !admin {
            return Err(AppError::IssueNotFound(issue.id));
        }

        let attachments = self.attachment_repo.find_by_issue(&issue.id, admin).await?;
        let comments = self
            .comments
            .thread_for(&issue.id, CommentSort::Support, viewer)
            .await?;
        let history = self.history_repo.find_by_issue(&issue.id).await?;
        let user_supported = match viewer {
            Some(user) => self.support_repo.has_issue_support(&user.id, &issue.id).await?,
            None => false,
        };

        Ok(IssueDetail {
            issue,
            attachments,
            comments,
            history,
            user_supported,
        })
    }

    /// Most supported published issues within `period`.
    pub async fn ranking(
        &self,
        period: RankingPeriod,
        limit: Option<u64>,
    ) -> AppResult<Vec<issue::Model>> {
        let limit = limit.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
        let search = IssueSearch {
            published_since: period.since(Utc::now()),
            ..IssueSearch::default()
        };
        self.issue_repo
            .search_published(&search, IssueOrder::Support, limit, 0)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use sinmungo_db::repositories::CommentRepository;
    use std::sync::Arc;

    fn service(db: MockDatabase) -> IssueService {
        let db = Arc::new(db.into_connection());
        IssueService::new(
            IssueRepository::new(db.clone()),
            AttachmentRepository::new(db.clone()),
            StatusHistoryRepository::new(db.clone()),
            SupportRepository::new(db.clone()),
            CommentService::new(
                CommentRepository::new(db.clone()),
                IssueRepository::new(db.clone()),
                SupportRepository::new(db),
            ),
        )
    }

    fn submit_input() -> SubmitIssueInput {
        SubmitIssueInput {
            title: "이면도로 과잉 주정차 단속".to_string(),
            summary: "새벽 시간 과태료 부과".to_string(),
            enforcement_type: "과태료".to_string(),
            field_category: "교통".to_string(),
            region: "서울".to_string(),
            occurred_at: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            content_overview: "개요".to_string(),
            content_problem: "문제".to_string(),
            content_common_sense: "상식".to_string(),
            content_comparison: Some("  ".to_string()),
            content_status: None,
            request_types: vec!["제도개선".to_string()],
            agencies: vec![Agency {
                agency_type: "구청".to_string(),
                agency_name: Some("종로구청".to_string()),
            }],
        }
    }

    #[test]
    fn test_submit_input_validation() {
        assert!(submit_input().validate().is_ok());

        let mut blank_title = submit_input();
        blank_title.title = "   ".to_string();
        assert!(blank_title.validate().is_err());

        let mut long_title = submit_input();
        long_title.title = "가".repeat(201);
        assert!(long_title.validate().is_err());

        let mut missing_problem = submit_input();
        missing_problem.content_problem = String::new();
        assert!(missing_problem.validate().is_err());
    }

    #[test]
    fn test_ranking_windows() {
        let now = Utc::now();
        assert_eq!(RankingPeriod::Weekly.since(now), Some(now - Duration::days(7)));
        assert_eq!(
            RankingPeriod::Monthly.since(now),
            Some(now - Duration::days(30))
        );
        assert_eq!(RankingPeriod::All.since(now), None);
    }

    #[test]
    fn test_sort_parses_lowercase() {
        let query: ListIssuesQuery = serde_json::from_str(r#"{"sort":"trending"}"#).unwrap();
        assert_eq!(query.sort, IssueSort::Trending);
        let query: ListIssuesQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.sort, IssueSort::Latest);
    }

    #[tokio::test]
    async fn test_submit_creates_unpublished_issue() {
        let stored = test_support::issue("i1", false);
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[stored]]);

        let issue = service(db)
            .submit(&test_support::user("author", false), submit_input())
            .await
            .unwrap();
        assert!(!issue.is_published);
        assert_eq!(issue.status, IssueStatus::Received);
        assert_eq!(issue.support_count, 0);
    }

    #[tokio::test]
    async fn test_submit_invalid_input_skips_database() {
        let mut input = submit_input();
        input.region = String::new();
        let result = service(MockDatabase::new(DatabaseBackend::Postgres))
            .submit(&test_support::user("author", false), input)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_published_returns_total() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                test_support::issue("i1", true),
                test_support::issue("i2", true),
            ]])
            .append_query_results([[maplit::btreemap! {
                "num_items" => Value::BigInt(Some(7))
            }]]);

        let page = service(db)
            .list_published(ListIssuesQuery {
                sort: IssueSort::Trending,
                ..ListIssuesQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 7);
    }

    #[tokio::test]
    async fn test_get_unpublished_issue_is_not_found_for_citizens() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_support::issue("i1", false)]]);
        let result = service(db)
            .get_issue("i1", Some(&test_support::user("citizen", false)))
            .await;
        assert!(matches!(result, Err(AppError::IssueNotFound(_))));
    }

    #[tokio::test]
    async fn test_get_issue_for_anonymous_viewer() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_support::issue("i1", true)]])
            .append_query_results([Vec::<attachment::Model>::new()])
            .append_query_results([[
                test_support::comment("c1", "i1", None),
                test_support::comment("c2", "i1", Some("c1")),
            ]])
            .append_query_results([Vec::<status_history::Model>::new()]);

        let detail = service(db).get_issue("i1", None).await.unwrap();
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.comments[0].replies.len(), 1);
        assert!(!detail.user_supported);
    }
}
