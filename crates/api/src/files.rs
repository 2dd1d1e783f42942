//! Signed access to attachments kept on the local filesystem.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use sinmungo_common::{AppError, AppResult, LocalStorage};

/// State for the file route.
#[derive(Clone)]
pub struct FileState {
    pub storage: Arc<LocalStorage>,
}

/// Query string of a signed URL.
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

/// Content type from the key's extension. Keys always end in the sanitized
/// original name, so the extension survives.
fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, e)| e).unwrap_or_default();
    match ext {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// `GET /files/{*key}?expires=..&signature=..`
///
/// Expired or forged links get 403; a valid link to a missing blob gets 404.
pub async fn serve_file(
    State(state): State<FileState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> AppResult<Response> {
    let now = chrono::Utc::now().timestamp();
    if !state
        .storage
        .signer()
        .verify(&key, query.expires, &query.signature, now)
    {
        return Err(AppError::Forbidden("Invalid or expired link".to_string()));
    }

    let data = state
        .storage
        .read(&key)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("File not found: {key}")))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(content_type_for(&key)),
            ),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("private, max-age=3600"),
            ),
        ],
        data,
    )
        .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, http::StatusCode, routing::get};
    use sinmungo_common::{BlobStore, UrlSigner};
    use tower::ServiceExt;

    fn app(storage: Arc<LocalStorage>) -> Router {
        Router::new()
            .route("/files/{*key}", get(serve_file))
            .with_state(FileState { storage })
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("i1/1_a.pdf"), "application/pdf");
        assert_eq!(content_type_for("i1/1_scan.jpg"), "image/jpeg");
        assert_eq!(content_type_for("i1/1_noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_signed_link_serves_blob() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(
            dir.path().to_path_buf(),
            "/files".to_string(),
            UrlSigner::new("secret"),
        ));
        storage
            .upload("i1/1_a.pdf", b"%PDF", "application/pdf")
            .await
            .unwrap();
        let url = storage
            .signed_url("i1/1_a.pdf", std::time::Duration::from_secs(60))
            .await
            .unwrap();

        let response = app(storage)
            .oneshot(Request::builder().uri(url).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/pdf"
        );
    }

    #[tokio::test]
    async fn test_forged_signature_is_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(
            dir.path().to_path_buf(),
            "/files".to_string(),
            UrlSigner::new("secret"),
        ));
        storage
            .upload("i1/1_a.pdf", b"%PDF", "application/pdf")
            .await
            .unwrap();

        let response = app(storage)
            .oneshot(
                Request::builder()
                    .uri("/files/i1/1_a.pdf?expires=9999999999&signature=00")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
