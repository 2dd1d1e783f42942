//! Issue repository.

use std::sync::Arc;

use crate::entities::{
    Issue,
    issue::{self, IssueStatus},
    issue_rejection, status_history,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::{Expr, Func},
};
use sinmungo_common::{AppError, AppResult};

/// Filters for the public issue listing.
#[derive(Debug, Clone, Default)]
pub struct IssueSearch {
    pub enforcement_type: Option<String>,
    pub field_category: Option<String>,
    pub region: Option<String>,
    pub status: Option<IssueStatus>,
    /// Case-insensitive substring of title or summary.
    pub query: Option<String>,
    /// Only issues published at or after this instant.
    pub published_since: Option<DateTime<Utc>>,
}

/// Ordering for the public issue listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IssueOrder {
    /// Newest publication first.
    #[default]
    Latest,
    /// Most supported first, newest publication breaking ties.
    Support,
}

/// Writes for one status transition, built by the caller from the locked row.
pub struct TransitionPlan {
    pub issue: issue::ActiveModel,
    pub history: status_history::ActiveModel,
}

/// Issue repository for database operations.
#[derive(Clone)]
pub struct IssueRepository {
    db: Arc<DatabaseConnection>,
}

impl IssueRepository {
    /// Create a new issue repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an issue by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<issue::Model>> {
        Issue::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get an issue by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<issue::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::IssueNotFound(id.to_string()))
    }

    /// Create a new issue.
    pub async fn create(&self, model: issue::ActiveModel) -> AppResult<issue::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Unpublished issues, newest submission first.
    pub async fn find_unpublished(&self) -> AppResult<Vec<issue::Model>> {
        Issue::find()
            .filter(issue::Column::IsPublished.eq(false))
            .order_by_desc(issue::Column::CreatedAt)
            .order_by_desc(issue::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every issue regardless of state, newest submission first.
    pub async fn find_all(&self, limit: u64, offset: u64) -> AppResult<Vec<issue::Model>> {
        Issue::find()
            .order_by_desc(issue::Column::CreatedAt)
            .order_by_desc(issue::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    fn search_condition(search: &IssueSearch) -> Condition {
        let mut condition = Condition::all().add(issue::Column::IsPublished.eq(true));

        if let Some(v) = &search.enforcement_type {
            condition = condition.add(issue::Column::EnforcementType.eq(v.as_str()));
        }
        if let Some(v) = &search.field_category {
            condition = condition.add(issue::Column::FieldCategory.eq(v.as_str()));
        }
        if let Some(v) = &search.region {
            condition = condition.add(issue::Column::Region.eq(v.as_str()));
        }
        if let Some(status) = search.status {
            condition = condition.add(issue::Column::Status.eq(status));
        }
        if let Some(since) = search.published_since {
            condition = condition.add(issue::Column::PublishedAt.gte(since));
        }
        if let Some(q) = search.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!(
                "%{}%",
                q.to_lowercase().replace('%', "\\%").replace('_', "\\_")
            );
            condition = condition.add(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(issue::Column::Title))).like(&pattern))
                    .add(
                        Expr::expr(Func::lower(Expr::col(issue::Column::Summary))).like(&pattern),
                    ),
            );
        }

        condition
    }

    /// Published issues matching `search`.
    pub async fn search_published(
        &self,
        search: &IssueSearch,
        order: IssueOrder,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<issue::Model>> {
        let mut query = Issue::find().filter(Self::search_condition(search));

        if order == IssueOrder::Support {
            query = query.order_by_desc(issue::Column::SupportCount);
        }

        query
            .order_by_desc(issue::Column::PublishedAt)
            .order_by_desc(issue::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of published issues matching `search`.
    pub async fn count_published(&self, search: &IssueSearch) -> AppResult<u64> {
        Issue::find()
            .filter(Self::search_condition(search))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Apply a status change atomically.
    ///
    /// The issue row is locked, `plan` decides what to write from its current
    /// state, then the issue update and the history insert commit together.
    /// A plan of `None` leaves everything untouched.
    pub async fn transition<F>(
        &self,
        issue_id: &str,
        plan: F,
    ) -> AppResult<(issue::Model, Option<status_history::Model>)>
    where
        F: FnOnce(&issue::Model) -> AppResult<Option<TransitionPlan>> + Send,
    {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let current = Issue::find_by_id(issue_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::IssueNotFound(issue_id.to_string()))?;

        let Some(plan) = plan(&current)? else {
            txn.commit()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok((current, None));
        };

        let updated = plan
            .issue
            .update(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let entry = plan
            .history
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((updated, Some(entry)))
    }

    /// Record a rejection and delete the issue in one transaction.
    pub async fn reject<F>(&self, issue_id: &str, record: F) -> AppResult<issue_rejection::Model>
    where
        F: FnOnce(&issue::Model) -> issue_rejection::ActiveModel + Send,
    {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let current = Issue::find_by_id(issue_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::IssueNotFound(issue_id.to_string()))?;

        let rejection = record(&current)
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Issue::delete_by_id(issue_id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rejection)
    }

    /// Count all issues.
    pub async fn count_all(&self) -> AppResult<u64> {
        Issue::find()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count issues awaiting approval.
    pub async fn count_unpublished(&self) -> AppResult<u64> {
        Issue::find()
            .filter(issue::Column::IsPublished.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Issue counts grouped by status. Statuses with no issues are absent.
    pub async fn count_by_status(&self) -> AppResult<Vec<(IssueStatus, i64)>> {
        let rows = Issue::find()
            .select_only()
            .column(issue::Column::Status)
            .column_as(issue::Column::Id.count(), "count")
            .group_by(issue::Column::Status)
            .into_model::<StatusCountRow>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(rows.into_iter().map(|r| (r.status, r.count)).collect())
    }

    /// Unpublished issue counts grouped by field category.
    pub async fn count_unpublished_by_category(&self) -> AppResult<Vec<(String, i64)>> {
        let rows = Issue::find()
            .filter(issue::Column::IsPublished.eq(false))
            .select_only()
            .column(issue::Column::FieldCategory)
            .column_as(issue::Column::Id.count(), "count")
            .group_by(issue::Column::FieldCategory)
            .order_by_asc(issue::Column::FieldCategory)
            .into_model::<CategoryCountRow>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|r| (r.field_category, r.count))
            .collect())
    }
}

#[derive(Debug, FromQueryResult)]
struct StatusCountRow {
    status: IssueStatus,
    count: i64,
}

#[derive(Debug, FromQueryResult)]
struct CategoryCountRow {
    field_category: String,
    count: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn create_test_issue(id: &str, is_published: bool) -> issue::Model {
        issue::Model {
            id: id.to_string(),
            author_id: "author1".to_string(),
            title: "과잉 단속".to_string(),
            summary: "요약".to_string(),
            enforcement_type: "과태료".to_string(),
            field_category: "교통".to_string(),
            region: "서울".to_string(),
            occurred_at: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            content_overview: "개요".to_string(),
            content_problem: "문제".to_string(),
            content_common_sense: "상식".to_string(),
            content_comparison: None,
            content_status: None,
            request_types: serde_json::json!([]),
            agencies: serde_json::json!([]),
            status: IssueStatus::Received,
            conclusion: None,
            is_published,
            published_at: None,
            support_count: 0,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_entry(issue_id: &str) -> status_history::Model {
        status_history::Model {
            id: "h1".to_string(),
            issue_id: issue_id.to_string(),
            from_status: None,
            to_status: IssueStatus::Received,
            note: None,
            changed_by: Some("admin".to_string()),
            changed_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<issue::Model>::new()])
                .into_connection(),
        );

        let repo = IssueRepository::new(db);
        let result = repo.get_by_id("missing").await;
        assert!(matches!(result, Err(AppError::IssueNotFound(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn test_find_unpublished() {
        let i1 = create_test_issue("i2", false);
        let i2 = create_test_issue("i1", false);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[i1, i2]])
                .into_connection(),
        );

        let repo = IssueRepository::new(db);
        let result = repo.find_unpublished().await.unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|i| !i.is_published));
    }

    #[tokio::test]
    async fn test_count_published() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(7))
                }]])
                .into_connection(),
        );

        let repo = IssueRepository::new(db);
        let search = IssueSearch {
            query: Some("단속".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.count_published(&search).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_transition_writes_issue_and_history_in_one_transaction() {
        let current = create_test_issue("i1", false);
        let mut published = current.clone();
        published.is_published = true;
        let entry = create_test_entry("i1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[current]])
                .append_query_results([[published]])
                .append_query_results([[entry]])
                .into_connection(),
        );

        let repo = IssueRepository::new(db);
        let (issue, history) = repo
            .transition("i1", |current| {
                let mut active: issue::ActiveModel = current.clone().into();
                active.is_published = Set(true);
                Ok(Some(TransitionPlan {
                    issue: active,
                    history: status_history::ActiveModel {
                        id: Set("h1".to_string()),
                        issue_id: Set(current.id.clone()),
                        from_status: Set(None),
                        to_status: Set(IssueStatus::Received),
                        note: Set(None),
                        changed_by: Set(Some("admin".to_string())),
                        changed_at: Set(Utc::now().into()),
                    },
                }))
            })
            .await
            .unwrap();

        assert!(issue.is_published);
        assert_eq!(history.unwrap().to_status, IssueStatus::Received);
    }

    #[tokio::test]
    async fn test_transition_none_plan_writes_nothing() {
        let current = create_test_issue("i1", true);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[current]])
                .into_connection(),
        );

        let repo = IssueRepository::new(db);
        let (issue, history) = repo.transition("i1", |_| Ok(None)).await.unwrap();
        assert!(issue.is_published);
        assert!(history.is_none());
    }

    #[tokio::test]
    async fn test_transition_plan_error_aborts() {
        let current = create_test_issue("i1", true);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[current]])
                .into_connection(),
        );

        let repo = IssueRepository::new(db);
        let result = repo
            .transition("i1", |_| Err(AppError::BadRequest("nope".to_string())))
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_reject_missing_issue() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<issue::Model>::new()])
                .into_connection(),
        );

        let repo = IssueRepository::new(db);
        let result = repo
            .reject("missing", |_| <issue_rejection::ActiveModel as Default>::default())
            .await;
        assert!(matches!(result, Err(AppError::IssueNotFound(_))));
    }

    #[tokio::test]
    async fn test_reject_records_then_deletes() {
        let current = create_test_issue("i1", false);
        let rejection = issue_rejection::Model {
            id: "r1".to_string(),
            issue_id: "i1".to_string(),
            author_id: "author1".to_string(),
            title: current.title.clone(),
            reason: "중복".to_string(),
            rejected_by: "admin".to_string(),
            rejected_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[current]])
                .append_query_results([[rejection]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = IssueRepository::new(db);
        let result = repo
            .reject("i1", |issue| issue_rejection::ActiveModel {
                id: Set("r1".to_string()),
                issue_id: Set(issue.id.clone()),
                author_id: Set(issue.author_id.clone()),
                title: Set(issue.title.clone()),
                reason: Set("중복".to_string()),
                rejected_by: Set("admin".to_string()),
                rejected_at: Set(Utc::now().into()),
            })
            .await
            .unwrap();

        assert_eq!(result.issue_id, "i1");
        assert_eq!(result.reason, "중복");
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    maplit::btreemap! {
                        "status" => sea_orm::Value::String(Some(Box::new("접수됨".to_string()))),
                        "count" => sea_orm::Value::BigInt(Some(3)),
                    },
                    maplit::btreemap! {
                        "status" => sea_orm::Value::String(Some(Box::new("종결".to_string()))),
                        "count" => sea_orm::Value::BigInt(Some(1)),
                    },
                ]])
                .into_connection(),
        );

        let repo = IssueRepository::new(db);
        let counts = repo.count_by_status().await.unwrap();
        assert_eq!(
            counts,
            vec![(IssueStatus::Received, 3), (IssueStatus::Concluded, 1)]
        );
    }
}
