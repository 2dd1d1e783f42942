//! Admin endpoints: the moderation queue and the dashboard.
//!
//! Every handler requires an authenticated admin; the services enforce it.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use sinmungo_common::AppResult;
use sinmungo_core::{ChangeStatusInput, DashboardStats, OpenReport, PendingAttachment};
use sinmungo_db::entities::{
    issue::{Conclusion, IssueStatus},
    issue_rejection,
    report::ReportStatus,
};

use super::{
    attachments::{AttachmentIdRequest, AttachmentResponse},
    comments::{CommentIdRequest, CommentResponse},
    issues::{HistoryResponse, IssueIdRequest, IssuePageResponse, IssueResponse},
    reports::ReportResponse,
};
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

// ==================== Request/Response Types ====================

/// Paging request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Reject issue request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectIssueRequest {
    pub issue_id: String,
    pub reason: String,
}

/// Change status request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusRequest {
    pub issue_id: String,
    pub status: IssueStatus,
    pub note: Option<String>,
    pub conclusion: Option<Conclusion>,
}

/// Resolve report request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveReportRequest {
    pub report_id: String,
    pub outcome: ReportStatus,
}

/// Pin comment request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinCommentRequest {
    pub comment_id: String,
    #[serde(default = "default_pinned")]
    pub pinned: bool,
}

const fn default_pinned() -> bool {
    true
}

/// Rejection log entry response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionResponse {
    pub id: String,
    pub issue_id: String,
    pub author_id: String,
    pub title: String,
    pub reason: String,
    pub rejected_by: String,
    pub rejected_at: String,
}

impl From<issue_rejection::Model> for RejectionResponse {
    fn from(r: issue_rejection::Model) -> Self {
        Self {
            id: r.id,
            issue_id: r.issue_id,
            author_id: r.author_id,
            title: r.title,
            reason: r.reason,
            rejected_by: r.rejected_by,
            rejected_at: r.rejected_at.to_rfc3339(),
        }
    }
}

/// Status change response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeResponse {
    pub issue: IssueResponse,
    pub history: HistoryResponse,
}

/// Pending attachment response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAttachmentResponse {
    #[serde(flatten)]
    pub attachment: AttachmentResponse,
    pub issue_title: Option<String>,
}

impl From<PendingAttachment> for PendingAttachmentResponse {
    fn from(p: PendingAttachment) -> Self {
        Self {
            attachment: p.attachment.into(),
            issue_title: p.issue_title,
        }
    }
}

/// Open report response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenReportResponse {
    #[serde(flatten)]
    pub report: ReportResponse,
    pub issue_title: Option<String>,
    pub reporter_nickname: Option<String>,
}

impl From<OpenReport> for OpenReportResponse {
    fn from(o: OpenReport) -> Self {
        Self {
            report: o.report.into(),
            issue_title: o.issue_title,
            reporter_nickname: o.reporter_nickname,
        }
    }
}

/// Count for one status.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCountResponse {
    pub status: IssueStatus,
    pub count: u64,
}

/// Pending count for one field category.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCountResponse {
    pub field_category: String,
    pub count: u64,
}

/// Dashboard response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_issues: u64,
    pub pending_approval: u64,
    pub pending_attachments: u64,
    pub pending_reports: u64,
    pub by_status: Vec<StatusCountResponse>,
    pub pending_by_category: Vec<CategoryCountResponse>,
}

impl From<DashboardStats> for StatsResponse {
    fn from(s: DashboardStats) -> Self {
        Self {
            total_issues: s.total_issues,
            pending_approval: s.pending_approval,
            pending_attachments: s.pending_attachments,
            pending_reports: s.pending_reports,
            by_status: s
                .by_status
                .into_iter()
                .map(|c| StatusCountResponse {
                    status: c.status,
                    count: c.count,
                })
                .collect(),
            pending_by_category: s
                .pending_by_category
                .into_iter()
                .map(|c| CategoryCountResponse {
                    field_category: c.field_category,
                    count: c.count,
                })
                .collect(),
        }
    }
}

// ==================== Issues ====================

/// Issues awaiting approval.
async fn pending_issues(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<IssueResponse>>> {
    let issues = state.moderation_service.list_pending_issues(&admin).await?;
    Ok(ApiResponse::ok(issues.into_iter().map(Into::into).collect()))
}

/// Every issue, published or not.
async fn list_issues(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PageRequest>,
) -> AppResult<ApiResponse<IssuePageResponse>> {
    let page = state
        .moderation_service
        .list_all_issues(&admin, req.page, req.per_page)
        .await?;
    Ok(ApiResponse::ok(page.into()))
}

/// Publish an issue.
async fn approve_issue(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<IssueIdRequest>,
) -> AppResult<ApiResponse<IssueResponse>> {
    let issue = state
        .moderation_service
        .approve_issue(&admin, &req.issue_id)
        .await?;
    Ok(ApiResponse::ok(issue.into()))
}

/// Reject and delete an issue, keeping the reason in the rejection log.
async fn reject_issue(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<RejectIssueRequest>,
) -> AppResult<ApiResponse<RejectionResponse>> {
    let rejection = state
        .moderation_service
        .reject_issue(&admin, &req.issue_id, &req.reason)
        .await?;
    Ok(ApiResponse::ok(rejection.into()))
}

/// Move an issue through the workflow.
async fn change_status(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ChangeStatusRequest>,
) -> AppResult<ApiResponse<StatusChangeResponse>> {
    let (issue, history) = state
        .status_service
        .change_status(
            &admin,
            ChangeStatusInput {
                issue_id: req.issue_id,
                status: req.status,
                note: req.note,
                conclusion: req.conclusion,
            },
        )
        .await?;
    Ok(ApiResponse::ok(StatusChangeResponse {
        issue: issue.into(),
        history: history.into(),
    }))
}

/// Rejection log.
async fn rejections(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PageRequest>,
) -> AppResult<ApiResponse<Vec<RejectionResponse>>> {
    let rows = state
        .moderation_service
        .list_rejections(&admin, req.page, req.per_page)
        .await?;
    Ok(ApiResponse::ok(rows.into_iter().map(Into::into).collect()))
}

// ==================== Attachments ====================

/// Attachments awaiting approval.
async fn pending_attachments(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<PendingAttachmentResponse>>> {
    let rows = state
        .moderation_service
        .list_pending_attachments(&admin)
        .await?;
    Ok(ApiResponse::ok(rows.into_iter().map(Into::into).collect()))
}

/// Make an attachment public.
async fn approve_attachment(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AttachmentIdRequest>,
) -> AppResult<ApiResponse<AttachmentResponse>> {
    let attachment = state
        .moderation_service
        .approve_attachment(&admin, &req.attachment_id)
        .await?;
    Ok(ApiResponse::ok(attachment.into()))
}

// ==================== Reports ====================

/// Reports still under review.
async fn list_reports(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<OpenReportResponse>>> {
    let rows = state.moderation_service.list_open_reports(&admin).await?;
    Ok(ApiResponse::ok(rows.into_iter().map(Into::into).collect()))
}

/// Close a report as resolved or dismissed.
async fn resolve_report(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ResolveReportRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .moderation_service
        .resolve_report(&admin, &req.report_id, req.outcome)
        .await?;
    Ok(ApiResponse::ok(report.into()))
}

// ==================== Comments ====================

async fn hide_comment(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CommentIdRequest>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state
        .moderation_service
        .hide_comment(&admin, &req.comment_id)
        .await?;
    Ok(ApiResponse::ok(comment.into()))
}

async fn unhide_comment(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CommentIdRequest>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state
        .moderation_service
        .unhide_comment(&admin, &req.comment_id)
        .await?;
    Ok(ApiResponse::ok(comment.into()))
}

/// Pin or unpin a comment.
async fn pin_comment(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PinCommentRequest>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state
        .moderation_service
        .pin_comment(&admin, &req.comment_id, req.pinned)
        .await?;
    Ok(ApiResponse::ok(comment.into()))
}

// ==================== Dashboard ====================

async fn stats(
    AuthUser(admin): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<StatsResponse>> {
    let stats = state.moderation_service.dashboard_stats(&admin).await?;
    Ok(ApiResponse::ok(stats.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/issues/pending", post(pending_issues))
        .route("/issues/list", post(list_issues))
        .route("/issues/approve", post(approve_issue))
        .route("/issues/reject", post(reject_issue))
        .route("/issues/status", post(change_status))
        .route("/issues/rejections", post(rejections))
        .route("/attachments/pending", post(pending_attachments))
        .route("/attachments/approve", post(approve_attachment))
        .route("/reports/list", post(list_reports))
        .route("/reports/resolve", post(resolve_report))
        .route("/comments/hide", post(hide_comment))
        .route("/comments/unhide", post(unhide_comment))
        .route("/comments/pin", post(pin_comment))
        .route("/stats", post(stats))
}
