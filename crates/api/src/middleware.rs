//! API middleware.

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use sinmungo_core::{
    AttachmentService, CommentService, IssueService, ModerationService, StatusService,
    SupportService, UserService,
};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub issue_service: IssueService,
    pub status_service: StatusService,
    pub moderation_service: ModerationService,
    pub comment_service: CommentService,
    pub support_service: SupportService,
    pub attachment_service: AttachmentService,
}

/// Authentication middleware.
///
/// Resolves `Authorization: Bearer <token>` into a `user::Model` extension.
/// Unknown tokens are ignored here; endpoints that need a user reject with 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.user_service.authenticate_by_token(token.trim()).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) => tracing::debug!(error = %e, "Bearer token rejected"),
        }
    }

    next.run(req).await
}
