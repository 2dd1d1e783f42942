//! Sinmungo server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::DefaultBodyLimit, middleware, routing::get};
use sinmungo_api::{FileState, middleware::AppState, router as api_router, serve_file};
use sinmungo_common::{
    BlobStore, Config, LocalStorage, UrlSigner,
    config::{StorageBackendKind, StorageConfig},
};
use sinmungo_core::{
    AttachmentService, CommentService, IssueService, ModerationService, StatusService,
    SupportService, UserService, policy_for,
};
use sinmungo_db::repositories::{
    AttachmentRepository, CommentRepository, IssueRejectionRepository, IssueRepository,
    ReportRepository, StatusHistoryRepository, SupportRepository, UserRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Multipart framing on top of the largest accepted attachment.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn local_storage(config: &StorageConfig) -> Arc<LocalStorage> {
    Arc::new(LocalStorage::new(
        config.base_path.clone(),
        config.base_url.clone(),
        UrlSigner::new(&config.signing_secret),
    ))
}

/// Pick the blob store. The local store is also returned for the `/files` route.
fn blob_store(
    config: &StorageConfig,
) -> Result<(Arc<dyn BlobStore>, Option<Arc<LocalStorage>>), Box<dyn std::error::Error>> {
    match config.backend {
        StorageBackendKind::Local => {
            let local = local_storage(config);
            let store: Arc<dyn BlobStore> = local.clone();
            info!(path = %config.base_path.display(), "Using local blob storage");
            Ok((store, Some(local)))
        }
        #[cfg(feature = "s3")]
        StorageBackendKind::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or("storage.backend is s3 but [storage.s3] is missing")?;
            let store: Arc<dyn BlobStore> = Arc::new(sinmungo_common::storage::S3Storage::new(s3));
            info!(bucket = %s3.bucket, "Using S3 blob storage");
            Ok((store, None))
        }
        #[cfg(not(feature = "s3"))]
        StorageBackendKind::S3 => {
            Err("storage.backend is s3 but the s3 feature is disabled".into())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sinmungo=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting sinmungo server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = sinmungo_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    sinmungo_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);

    // Initialize repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let issue_repo = IssueRepository::new(Arc::clone(&db));
    let history_repo = StatusHistoryRepository::new(Arc::clone(&db));
    let rejection_repo = IssueRejectionRepository::new(Arc::clone(&db));
    let attachment_repo = AttachmentRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let support_repo = SupportRepository::new(Arc::clone(&db));
    let report_repo = ReportRepository::new(Arc::clone(&db));

    let (store, local) = blob_store(&config.storage)?;

    let policy = policy_for(config.moderation.transition_policy);
    info!(policy = policy.name(), "Status transition policy");

    // Initialize services
    let comment_service = CommentService::new(
        comment_repo.clone(),
        issue_repo.clone(),
        support_repo.clone(),
    );
    let attachment_service = AttachmentService::new(
        attachment_repo.clone(),
        issue_repo.clone(),
        store,
        &config.storage,
    );
    let max_body = attachment_service.max_upload_bytes() + MULTIPART_OVERHEAD;

    let state = AppState {
        user_service: UserService::new(user_repo.clone(), config.auth.clone()),
        issue_service: IssueService::new(
            issue_repo.clone(),
            attachment_repo.clone(),
            history_repo.clone(),
            support_repo.clone(),
            comment_service.clone(),
        ),
        status_service: StatusService::new(issue_repo.clone(), history_repo, policy),
        moderation_service: ModerationService::new(
            issue_repo.clone(),
            rejection_repo,
            attachment_repo,
            report_repo,
            comment_repo.clone(),
            user_repo,
        ),
        comment_service,
        support_service: SupportService::new(support_repo, issue_repo, comment_repo),
        attachment_service,
    };

    // Build router
    let mut app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            sinmungo_api::middleware::auth_middleware,
        ))
        .with_state(state);

    if let Some(storage) = local {
        let route = format!("{}/{{*key}}", config.storage.base_url.trim_end_matches('/'));
        app = app.route(&route, get(serve_file).with_state(FileState { storage }));
    }

    let app = app
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
