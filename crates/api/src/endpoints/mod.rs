//! API endpoints.

mod admin;
mod attachments;
mod auth;
mod comments;
mod issues;
mod reports;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/issues", issues::router())
        .nest("/comments", comments::router())
        .nest("/attachments", attachments::router())
        .nest("/reports", reports::router())
        .nest("/admin", admin::router())
}
