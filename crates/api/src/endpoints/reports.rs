//! Report endpoints.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use sinmungo_common::AppResult;
use sinmungo_core::CreateReportInput;
use sinmungo_db::entities::report::{self, ReportStatus};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Report response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub id: String,
    pub issue_id: String,
    pub reporter_id: String,
    pub reason: String,
    pub status: ReportStatus,
    pub resolved_by: Option<String>,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

impl From<report::Model> for ReportResponse {
    fn from(r: report::Model) -> Self {
        Self {
            id: r.id,
            issue_id: r.issue_id,
            reporter_id: r.reporter_id,
            reason: r.reason,
            status: r.status,
            resolved_by: r.resolved_by,
            created_at: r.created_at.to_rfc3339(),
            resolved_at: r.resolved_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Create report request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    pub issue_id: String,
    pub reason: String,
}

/// Flag a published issue for moderator attention.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateReportRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .moderation_service
        .create_report(
            &user,
            CreateReportInput {
                issue_id: req.issue_id,
                reason: req.reason,
            },
        )
        .await?;
    Ok(ApiResponse::ok(report.into()))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/create", post(create))
}
