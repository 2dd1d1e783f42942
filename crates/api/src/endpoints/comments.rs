//! Comment endpoints.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use sinmungo_common::AppResult;
use sinmungo_core::{CommentReply, CommentSort, CommentThread, CreateCommentInput};
use sinmungo_db::entities::comment::{self, CommentType};

use super::issues::SupportResponse;
use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Comment response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub issue_id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub comment_type: CommentType,
    pub support_count: i32,
    pub is_pinned: bool,
    pub is_hidden: bool,
    pub created_at: String,
}

impl From<comment::Model> for CommentResponse {
    fn from(c: comment::Model) -> Self {
        Self {
            id: c.id,
            issue_id: c.issue_id,
            user_id: c.user_id,
            parent_id: c.parent_id,
            content: c.content,
            comment_type: c.comment_type,
            support_count: c.support_count,
            is_pinned: c.is_pinned,
            is_hidden: c.is_hidden,
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

/// A reply inside a thread.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentReplyResponse {
    #[serde(flatten)]
    pub comment: CommentResponse,
    pub user_supported: bool,
}

impl From<CommentReply> for CommentReplyResponse {
    fn from(r: CommentReply) -> Self {
        Self {
            comment: r.comment.into(),
            user_supported: r.user_supported,
        }
    }
}

/// A top-level comment with its replies.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThreadResponse {
    #[serde(flatten)]
    pub comment: CommentResponse,
    pub user_supported: bool,
    pub replies: Vec<CommentReplyResponse>,
}

impl From<CommentThread> for CommentThreadResponse {
    fn from(t: CommentThread) -> Self {
        Self {
            comment: t.comment.into(),
            user_supported: t.user_supported,
            replies: t.replies.into_iter().map(Into::into).collect(),
        }
    }
}

/// Create comment request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub issue_id: String,
    pub content: String,
    #[serde(default)]
    pub comment_type: CommentType,
    pub parent_id: Option<String>,
}

/// List comments request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCommentsRequest {
    pub issue_id: String,
    #[serde(default)]
    pub sort: CommentSort,
}

/// Request naming a single comment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentIdRequest {
    pub comment_id: String,
}

/// Post a comment or a reply.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<ApiResponse<CommentResponse>> {
    let comment = state
        .comment_service
        .create(
            &user,
            CreateCommentInput {
                issue_id: req.issue_id,
                content: req.content,
                comment_type: req.comment_type,
                parent_id: req.parent_id,
            },
        )
        .await?;

    Ok(ApiResponse::ok(comment.into()))
}

/// Comment thread of an issue.
async fn list(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListCommentsRequest>,
) -> AppResult<ApiResponse<Vec<CommentThreadResponse>>> {
    let threads = state
        .comment_service
        .list(&req.issue_id, req.sort, viewer.viewer())
        .await?;
    Ok(ApiResponse::ok(threads.into_iter().map(Into::into).collect()))
}

/// Toggle the caller's support of a comment.
async fn support(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CommentIdRequest>,
) -> AppResult<ApiResponse<SupportResponse>> {
    let toggle = state
        .support_service
        .toggle_comment(&user, &req.comment_id)
        .await?;
    Ok(ApiResponse::ok(toggle.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/list", post(list))
        .route("/support", post(support))
}
