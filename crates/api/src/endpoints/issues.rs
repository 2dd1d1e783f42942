//! Issue endpoints: submission and the public read paths.

use axum::{Json, Router, extract::State, routing::post};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sinmungo_common::AppResult;
use sinmungo_core::{IssueSort, ListIssuesQuery, RankingPeriod, SubmitIssueInput};
use sinmungo_db::{
    entities::{
        issue::{self, Agency, Conclusion, IssueStatus},
        status_history,
    },
    repositories::SupportToggle,
};

use super::{attachments::AttachmentResponse, comments::CommentThreadResponse};
use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

// ==================== Request/Response Types ====================

/// Agency named in a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyBody {
    pub agency_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_name: Option<String>,
}

impl From<AgencyBody> for Agency {
    fn from(a: AgencyBody) -> Self {
        Self {
            agency_type: a.agency_type,
            agency_name: a.agency_name,
        }
    }
}

impl From<Agency> for AgencyBody {
    fn from(a: Agency) -> Self {
        Self {
            agency_type: a.agency_type,
            agency_name: a.agency_name,
        }
    }
}

/// Issue response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub summary: String,
    pub enforcement_type: String,
    pub field_category: String,
    pub region: String,
    pub occurred_at: String,
    pub content_overview: String,
    pub content_problem: String,
    pub content_common_sense: String,
    pub content_comparison: Option<String>,
    pub content_status: Option<String>,
    pub request_types: Vec<String>,
    pub agencies: Vec<AgencyBody>,
    pub status: IssueStatus,
    pub conclusion: Option<Conclusion>,
    pub is_published: bool,
    pub published_at: Option<String>,
    pub support_count: i32,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<issue::Model> for IssueResponse {
    fn from(i: issue::Model) -> Self {
        let request_types = i.request_type_list();
        let agencies = i.agency_list();

        Self {
            id: i.id,
            author_id: i.author_id,
            title: i.title,
            summary: i.summary,
            enforcement_type: i.enforcement_type,
            field_category: i.field_category,
            region: i.region,
            occurred_at: i.occurred_at.to_string(),
            content_overview: i.content_overview,
            content_problem: i.content_problem,
            content_common_sense: i.content_common_sense,
            content_comparison: i.content_comparison,
            content_status: i.content_status,
            request_types,
            agencies: agencies.into_iter().map(Into::into).collect(),
            status: i.status,
            conclusion: i.conclusion,
            is_published: i.is_published,
            published_at: i.published_at.map(|t| t.to_rfc3339()),
            support_count: i.support_count,
            created_at: i.created_at.to_rfc3339(),
            updated_at: i.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Status history entry response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub id: String,
    pub issue_id: String,
    pub from_status: Option<IssueStatus>,
    pub to_status: IssueStatus,
    pub note: Option<String>,
    pub changed_by: Option<String>,
    pub changed_at: String,
}

impl From<status_history::Model> for HistoryResponse {
    fn from(h: status_history::Model) -> Self {
        Self {
            id: h.id,
            issue_id: h.issue_id,
            from_status: h.from_status,
            to_status: h.to_status,
            note: h.note,
            changed_by: h.changed_by,
            changed_at: h.changed_at.to_rfc3339(),
        }
    }
}

/// Paged issue list response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePageResponse {
    pub items: Vec<IssueResponse>,
    pub total: u64,
}

impl From<sinmungo_core::IssuePage> for IssuePageResponse {
    fn from(page: sinmungo_core::IssuePage) -> Self {
        Self {
            items: page.items.into_iter().map(Into::into).collect(),
            total: page.total,
        }
    }
}

/// Support toggle response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportResponse {
    pub supported: bool,
    pub count: i32,
}

impl From<SupportToggle> for SupportResponse {
    fn from(t: SupportToggle) -> Self {
        Self {
            supported: t.supported,
            count: t.count,
        }
    }
}

/// Create issue request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueRequest {
    pub title: String,
    pub summary: String,
    pub enforcement_type: String,
    pub field_category: String,
    pub region: String,
    pub occurred_at: NaiveDate,
    pub content_overview: String,
    pub content_problem: String,
    pub content_common_sense: String,
    pub content_comparison: Option<String>,
    pub content_status: Option<String>,
    #[serde(default)]
    pub request_types: Vec<String>,
    #[serde(default)]
    pub agencies: Vec<AgencyBody>,
}

impl From<CreateIssueRequest> for SubmitIssueInput {
    fn from(r: CreateIssueRequest) -> Self {
        Self {
            title: r.title,
            summary: r.summary,
            enforcement_type: r.enforcement_type,
            field_category: r.field_category,
            region: r.region,
            occurred_at: r.occurred_at,
            content_overview: r.content_overview,
            content_problem: r.content_problem,
            content_common_sense: r.content_common_sense,
            content_comparison: r.content_comparison,
            content_status: r.content_status,
            request_types: r.request_types,
            agencies: r.agencies.into_iter().map(Into::into).collect(),
        }
    }
}

/// List issues request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListIssuesRequest {
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

/// Request naming a single issue.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueIdRequest {
    pub issue_id: String,
}

/// Ranking request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingRequest {
    #[serde(default)]
    pub period: RankingPeriod,
    pub limit: Option<u64>,
}

/// Issue detail response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDetailResponse {
    pub issue: IssueResponse,
    pub attachments: Vec<AttachmentResponse>,
    pub comments: Vec<CommentThreadResponse>,
    pub history: Vec<HistoryResponse>,
    pub user_supported: bool,
}

// ==================== Handlers ====================

/// Submit a new issue for review.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateIssueRequest>,
) -> AppResult<ApiResponse<IssueResponse>> {
    let issue = state.issue_service.submit(&user, req.into()).await?;
    Ok(ApiResponse::ok(issue.into()))
}

/// Public listing of published issues.
async fn list(
    State(state): State<AppState>,
    Json(req): Json<ListIssuesRequest>,
) -> AppResult<ApiResponse<IssuePageResponse>> {
    let page = state
        .issue_service
        .list_published(ListIssuesQuery {
            enforcement_type: req.enforcement_type,
            field_category: req.field_category,
            region: req.region,
            status: req.status,
            q: req.q,
            sort: req.sort,
            page: req.page,
            per_page: req.per_page,
        })
        .await?;

    Ok(ApiResponse::ok(page.into()))
}

/// Issue detail page.
async fn show(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Json(req): Json<IssueIdRequest>,
) -> AppResult<ApiResponse<IssueDetailResponse>> {
    let detail = state
        .issue_service
        .get_issue(&req.issue_id, viewer.viewer())
        .await?;

    Ok(ApiResponse::ok(IssueDetailResponse {
        issue: detail.issue.into(),
        attachments: detail.attachments.into_iter().map(Into::into).collect(),
        comments: detail.comments.into_iter().map(Into::into).collect(),
        history: detail.history.into_iter().map(Into::into).collect(),
        user_supported: detail.user_supported,
    }))
}

/// Most supported issues of a period.
async fn ranking(
    State(state): State<AppState>,
    Json(req): Json<RankingRequest>,
) -> AppResult<ApiResponse<Vec<IssueResponse>>> {
    let issues = state.issue_service.ranking(req.period, req.limit).await?;
    Ok(ApiResponse::ok(issues.into_iter().map(Into::into).collect()))
}

/// Status history of an issue.
async fn history(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Json(req): Json<IssueIdRequest>,
) -> AppResult<ApiResponse<Vec<HistoryResponse>>> {
    let entries = state
        .status_service
        .history(&req.issue_id, viewer.viewer())
        .await?;
    Ok(ApiResponse::ok(entries.into_iter().map(Into::into).collect()))
}

/// Toggle the caller's support of an issue.
async fn support(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<IssueIdRequest>,
) -> AppResult<ApiResponse<SupportResponse>> {
    let toggle = state
        .support_service
        .toggle_issue(&user, &req.issue_id)
        .await?;
    Ok(ApiResponse::ok(toggle.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/list", post(list))
        .route("/show", post(show))
        .route("/ranking", post(ranking))
        .route("/history", post(history))
        .route("/support", post(support))
}
