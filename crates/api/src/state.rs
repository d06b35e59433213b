use std::sync::Arc;

use meridian_engine::analyzer::ColumnAnalyzer;
use meridian_engine::executor::ImportExecutor;
use meridian_engine::fields::FieldProvider;
use meridian_engine::store::SessionStore;
use meridian_events::EventBus;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: meridian_db::DbPool,
    /// Session lifecycle and spool management.
    pub store: SessionStore,
    /// Per-tenant field metadata.
    pub fields: Arc<dyn FieldProvider>,
    /// Cached per-column value analyses.
    pub analyzer: Arc<ColumnAnalyzer>,
    /// Dry-run previews and commit runs.
    pub executor: ImportExecutor,
    /// Event bus feeding the SSE progress stream.
    pub bus: Arc<EventBus>,
    /// Tracks spawned commit runs so shutdown can drain them.
    pub commits: TaskTracker,
    /// Cancelled when shutdown gives up waiting for commit runs.
    pub commit_cancel: CancellationToken,
}
