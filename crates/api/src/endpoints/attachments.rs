//! Attachment endpoints.

use axum::{
    Json, Router,
    extract::{Multipart, State},
    routing::post,
};
use serde::{Deserialize, Serialize};
use sinmungo_common::{AppError, AppResult};
use sinmungo_core::{UploadInput, is_admin};
use sinmungo_db::entities::attachment::{self, AttachmentFileType};

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{ApiResponse, OkResponse},
};

/// Attachment response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentResponse {
    pub id: String,
    pub issue_id: String,
    pub uploader_id: String,
    pub file_type: AttachmentFileType,
    pub original_name: String,
    pub content_type: String,
    pub size: i64,
    pub file_url: String,
    pub is_approved: bool,
    pub created_at: String,
}

impl From<attachment::Model> for AttachmentResponse {
    fn from(a: attachment::Model) -> Self {
        Self {
            id: a.id,
            issue_id: a.issue_id,
            uploader_id: a.uploader_id,
            file_type: a.file_type,
            original_name: a.original_name,
            content_type: a.content_type,
            size: a.size,
            file_url: a.file_url,
            is_approved: a.is_approved,
            created_at: a.created_at.to_rfc3339(),
        }
    }
}

/// Request naming a single attachment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentIdRequest {
    pub attachment_id: String,
}

/// List attachments request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAttachmentsRequest {
    pub issue_id: String,
}

fn parse_file_type(text: &str) -> AppResult<AttachmentFileType> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .map_err(|_| AppError::BadRequest(format!("Unknown file type: {text}")))
}

/// Upload an evidence file via multipart form (`issueId`, `fileType`, `file`).
async fn upload(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<AttachmentResponse>> {
    let mut issue_id: Option<String> = None;
    let mut file_type: Option<AttachmentFileType> = None;
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(ToString::to_string);
                content_type = field.content_type().map(ToString::to_string);
                file_data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?
                        .to_vec(),
                );
            }
            "issueId" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !text.is_empty() {
                    issue_id = Some(text);
                }
            }
            "fileType" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file_type = Some(parse_file_type(text.trim())?);
            }
            _ => {}
        }
    }

    let issue_id = issue_id.ok_or_else(|| AppError::BadRequest("issueId is required".to_string()))?;
    let file_type =
        file_type.ok_or_else(|| AppError::BadRequest("fileType is required".to_string()))?;
    let data = file_data.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;

    let input = UploadInput {
        issue_id,
        file_type,
        file_name: file_name.unwrap_or_else(|| "unnamed".to_string()),
        content_type: content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
        data,
    };

    let attachment = state.attachment_service.upload(&user, input).await?;
    Ok(ApiResponse::ok(attachment.into()))
}

/// Delete one of the caller's unapproved attachments.
async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AttachmentIdRequest>,
) -> AppResult<ApiResponse<OkResponse>> {
    state
        .attachment_service
        .delete(&user, &req.attachment_id)
        .await?;
    Ok(ApiResponse::ok(OkResponse::new()))
}

/// Attachments of an issue. Admins also see pending ones.
async fn list(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListAttachmentsRequest>,
) -> AppResult<ApiResponse<Vec<AttachmentResponse>>> {
    let attachments = state
        .attachment_service
        .list_for_issue(&req.issue_id, is_admin(viewer.viewer()))
        .await?;
    Ok(ApiResponse::ok(
        attachments.into_iter().map(Into::into).collect(),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload))
        .route("/delete", post(delete))
        .route("/list", post(list))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_type() {
        assert_eq!(
            parse_file_type("판결문").ok(),
            Some(AttachmentFileType::Judgment)
        );
        assert!(matches!(
            parse_file_type("영수증"),
            Err(AppError::BadRequest(_))
        ));
    }
}
