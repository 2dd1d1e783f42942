//! Authentication endpoints.

use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use sinmungo_common::AppResult;
use sinmungo_core::{SigninInput, SignupInput};
use sinmungo_db::entities::user;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, OkResponse},
};

/// Signup request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub nickname: Option<String>,
}

/// Signin request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

/// An account together with its bearer token.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: String,
    pub username: String,
    pub nickname: Option<String>,
    pub is_admin: bool,
    pub token: String,
}

impl From<user::Model> for SessionResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            nickname: user.nickname,
            is_admin: user.is_admin,
            token: user.token.unwrap_or_default(),
        }
    }
}

/// Create a new account.
async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let user = state
        .user_service
        .signup(SignupInput {
            username: req.username,
            password: req.password,
            nickname: req.nickname,
        })
        .await?;

    Ok(ApiResponse::ok(user.into()))
}

/// Sign in to an existing account.
async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> AppResult<ApiResponse<SessionResponse>> {
    let user = state
        .user_service
        .signin(SigninInput {
            username: req.username,
            password: req.password,
        })
        .await?;

    Ok(ApiResponse::ok(user.into()))
}

/// Sign out by rotating the token, which invalidates the current one.
async fn signout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<OkResponse>> {
    state.user_service.regenerate_token(&user).await?;
    Ok(ApiResponse::ok(OkResponse::new()))
}

/// Regenerate token response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateTokenResponse {
    pub token: String,
}

/// Issue a fresh token for the current user.
async fn regenerate_token(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<RegenerateTokenResponse>> {
    let token = state.user_service.regenerate_token(&user).await?;
    Ok(ApiResponse::ok(RegenerateTokenResponse { token }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .route("/regenerate-token", post(regenerate_token))
}
