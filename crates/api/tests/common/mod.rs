// Not every test binary uses every helper.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;
use uuid::Uuid;

use meridian_api::config::ServerConfig;
use meridian_api::router::build_app_router;
use meridian_api::state::AppState;
use meridian_core::types::TenantId;
use meridian_db::models::tenant::{CreateTenant, Tenant};
use meridian_db::repositories::TenantRepo;
use meridian_engine::analyzer::ColumnAnalyzer;
use meridian_engine::executor::ImportExecutor;
use meridian_engine::fields::{FieldProvider, PgFieldProvider};
use meridian_engine::store::SessionStore;
use meridian_events::EventBus;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout. The spool root points at the caller's
/// temp directory so each test gets an isolated filesystem.
pub fn test_config(spool_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        spool_dir: PathBuf::from(spool_dir),
        max_upload_bytes: 1024 * 1024,
        session_max_age_hours: 24,
        heartbeat_stale_minutes: 30,
        failed_row_retention_days: 30,
        cleanup_interval_secs: 3600,
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool and spool directory.
///
/// Calls the same [`build_app_router`] as `main.rs` so integration tests
/// exercise the middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery, body limit) that production uses.
pub fn build_test_app(pool: PgPool, spool_dir: &Path) -> Router {
    let config = test_config(spool_dir);
    let bus = Arc::new(EventBus::default());
    let fields: Arc<dyn FieldProvider> = Arc::new(PgFieldProvider::new(pool.clone()));

    let state = AppState {
        pool: pool.clone(),
        store: SessionStore::new(pool.clone(), &config.spool_dir, Arc::clone(&bus)),
        fields: Arc::clone(&fields),
        analyzer: Arc::new(ColumnAnalyzer::new()),
        executor: ImportExecutor::new(pool, fields, Arc::clone(&bus)),
        bus,
        commits: TaskTracker::new(),
        commit_cancel: CancellationToken::new(),
    };

    build_app_router(state, &config)
}

/// Create a tenant to scope requests under. Slugs are salted with a UUID
/// because `#[sqlx::test]` databases share migrations, not data.
pub async fn seed_tenant(pool: &PgPool) -> Tenant {
    TenantRepo::create(
        pool,
        &CreateTenant {
            name: "Acme".to_string(),
            slug: format!("acme-{}", Uuid::new_v4()),
        },
    )
    .await
    .unwrap()
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send a GET request scoped to a tenant.
pub async fn get(app: Router, tenant: TenantId, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("x-tenant-id", tenant.to_string())
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a bodyless POST (heartbeat, preview, commit), scoped to a tenant.
pub async fn post_empty(app: Router, tenant: TenantId, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("x-tenant-id", tenant.to_string())
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a PUT request with a JSON body, scoped to a tenant.
pub async fn put_json(
    app: Router,
    tenant: TenantId,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header("x-tenant-id", tenant.to_string())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a DELETE request scoped to a tenant.
pub async fn delete(app: Router, tenant: TenantId, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header("x-tenant-id", tenant.to_string())
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a spreadsheet as a `multipart/form-data` upload with the given
/// `entity_type`. The body is assembled by hand; Axum only needs the
/// boundary to agree between header and payload.
pub async fn upload(
    app: Router,
    tenant: TenantId,
    entity_type: &str,
    file_name: &str,
    bytes: &[u8],
) -> Response<Body> {
    let boundary = "meridian-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"entity_type\"\r\n\r\n\
             {entity_type}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/import/sessions")
        .header("x-tenant-id", tenant.to_string())
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
