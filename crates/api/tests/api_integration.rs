//! API integration tests.
//!
//! These drive the full router, including the auth middleware, against a
//! mock database.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
    middleware,
};
use sea_orm::{DatabaseBackend, MockDatabase, Value};
use sinmungo_api::{
    middleware::{AppState, auth_middleware},
    router as api_router,
};
use sinmungo_common::{
    LocalStorage, UrlSigner,
    config::{AuthConfig, StorageConfig},
};
use sinmungo_core::{
    AttachmentService, CommentService, IssueService, ModerationService, PermissivePolicy,
    StatusService, SupportService, UserService,
};
use sinmungo_db::{
    entities::{
        issue::{self, IssueStatus},
        user,
    },
    repositories::{
        AttachmentRepository, CommentRepository, IssueRejectionRepository, IssueRepository,
        ReportRepository, StatusHistoryRepository, SupportRepository, UserRepository,
    },
};
use tower::ServiceExt;

/// Create test app state on top of `db`.
fn create_test_state(db: MockDatabase) -> AppState {
    let db = Arc::new(db.into_connection());

    let storage = Arc::new(LocalStorage::new(
        std::env::temp_dir().join("sinmungo-api-tests"),
        "/files".to_string(),
        UrlSigner::new("test-secret"),
    ));

    let comment_service = CommentService::new(
        CommentRepository::new(Arc::clone(&db)),
        IssueRepository::new(Arc::clone(&db)),
        SupportRepository::new(Arc::clone(&db)),
    );

    AppState {
        user_service: UserService::new(
            UserRepository::new(Arc::clone(&db)),
            AuthConfig {
                admin_usernames: vec!["root".to_string()],
            },
        ),
        issue_service: IssueService::new(
            IssueRepository::new(Arc::clone(&db)),
            AttachmentRepository::new(Arc::clone(&db)),
            StatusHistoryRepository::new(Arc::clone(&db)),
            SupportRepository::new(Arc::clone(&db)),
            comment_service.clone(),
        ),
        status_service: StatusService::new(
            IssueRepository::new(Arc::clone(&db)),
            StatusHistoryRepository::new(Arc::clone(&db)),
            Arc::new(PermissivePolicy),
        ),
        moderation_service: ModerationService::new(
            IssueRepository::new(Arc::clone(&db)),
            IssueRejectionRepository::new(Arc::clone(&db)),
            AttachmentRepository::new(Arc::clone(&db)),
            ReportRepository::new(Arc::clone(&db)),
            CommentRepository::new(Arc::clone(&db)),
            UserRepository::new(Arc::clone(&db)),
        ),
        comment_service,
        support_service: SupportService::new(
            SupportRepository::new(Arc::clone(&db)),
            IssueRepository::new(Arc::clone(&db)),
            CommentRepository::new(Arc::clone(&db)),
        ),
        attachment_service: AttachmentService::new(
            AttachmentRepository::new(Arc::clone(&db)),
            IssueRepository::new(Arc::clone(&db)),
            storage,
            &StorageConfig::default(),
        ),
    }
}

/// Create the test router with the auth middleware in place.
fn create_test_router(db: MockDatabase) -> Router {
    let state = create_test_state(db);
    api_router()
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

fn test_user(id: &str, is_admin: bool) -> user::Model {
    user::Model {
        id: id.to_string(),
        username: id.to_string(),
        username_lower: id.to_string(),
        nickname: None,
        token: Some(format!("{id}-token")),
        password_hash: String::new(),
        is_admin,
        created_at: chrono::Utc::now().into(),
        updated_at: None,
    }
}

fn published_issue(id: &str) -> issue::Model {
    issue::Model {
        id: id.to_string(),
        author_id: "citizen".to_string(),
        title: "심야 단속".to_string(),
        summary: "요약".to_string(),
        enforcement_type: "과태료".to_string(),
        field_category: "교통".to_string(),
        region: "서울".to_string(),
        occurred_at: chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        content_overview: "개요".to_string(),
        content_problem: "문제".to_string(),
        content_common_sense: "상식".to_string(),
        content_comparison: None,
        content_status: None,
        request_types: serde_json::json!(["제도개선"]),
        agencies: serde_json::json!([{"agency_type": "경찰"}]),
        status: IssueStatus::Received,
        conclusion: None,
        is_published: true,
        published_at: Some(chrono::Utc::now().into()),
        support_count: 3,
        created_at: chrono::Utc::now().into(),
        updated_at: None,
    }
}

fn post_json(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_public_issue_list() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[published_issue("i1")]])
        .append_query_results([[BTreeMap::from([("num_items", Value::BigInt(Some(1)))])]]);
    let app = create_test_router(db);

    let response = app
        .oneshot(post_json("/issues/list", None, r#"{"sort":"support"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["total"], 1);
    let item = &body["data"]["items"][0];
    assert_eq!(item["id"], "i1");
    assert_eq!(item["status"], "접수됨");
    assert_eq!(item["supportCount"], 3);
    assert_eq!(item["requestTypes"][0], "제도개선");
    assert_eq!(item["agencies"][0]["agencyType"], "경찰");
}

#[tokio::test]
async fn test_create_issue_requires_auth() {
    let app = create_test_router(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(post_json("/issues/create", None, "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<user::Model>::new()]);
    let app = create_test_router(db);

    let response = app
        .oneshot(post_json(
            "/issues/support",
            Some("stale-token"),
            r#"{"issueId":"i1"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_reject_citizens() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_user("citizen", false)]]);
    let app = create_test_router(db);

    let response = app
        .oneshot(post_json("/admin/stats", Some("citizen-token"), "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_conclusion_without_concluded_status() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_user("root", true)]]);
    let app = create_test_router(db);

    let response = app
        .oneshot(post_json(
            "/admin/issues/status",
            Some("root-token"),
            r#"{"issueId":"i1","status":"검토중","conclusion":"개선"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signup_rejects_bad_username() {
    let app = create_test_router(MockDatabase::new(DatabaseBackend::Postgres));

    let response = app
        .oneshot(post_json(
            "/auth/signup",
            None,
            r#"{"username":"no spaces!","password":"password123"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

fn multipart_request(token: &str, parts: &[(&str, Option<(&str, &str)>, &str)]) -> Request<Body> {
    const BOUNDARY: &str = "sinmungo-test-boundary";
    let mut body = String::new();
    for (name, file, value) in parts {
        body.push_str(&format!("--{BOUNDARY}\r\n"));
        match file {
            Some((file_name, content_type)) => {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n"
                ));
                body.push_str(&format!("Content-Type: {content_type}\r\n\r\n"));
            }
            None => {
                body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                ));
            }
        }
        body.push_str(value);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .uri("/attachments/upload")
        .method("POST")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_upload_requires_file_type() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_user("citizen", false)]]);
    let app = create_test_router(db);

    let response = app
        .oneshot(multipart_request(
            "citizen-token",
            &[
                ("issueId", None, "i1"),
                ("file", Some(("scan.pdf", "application/pdf")), "%PDF-1.4"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_rejects_disallowed_type() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_user("citizen", false)]]);
    let app = create_test_router(db);

    let response = app
        .oneshot(multipart_request(
            "citizen-token",
            &[
                ("issueId", None, "i1"),
                ("fileType", None, "판결문"),
                ("file", Some(("notes.txt", "text/plain")), "hello"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("text/plain")
    );
}
