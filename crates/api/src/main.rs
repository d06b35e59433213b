use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meridian_api::config::ServerConfig;
use meridian_api::router::build_app_router;
use meridian_api::state::AppState;
use meridian_engine::analyzer::ColumnAnalyzer;
use meridian_engine::cleanup::CleanupSweep;
use meridian_engine::executor::ImportExecutor;
use meridian_engine::fields::{FieldProvider, PgFieldProvider};
use meridian_engine::store::SessionStore;
use meridian_events::EventBus;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "meridian_api=debug,meridian_engine=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = meridian_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    meridian_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    meridian_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let bus = Arc::new(EventBus::default());

    // --- Import pipeline services ---
    let store = SessionStore::new(pool.clone(), &config.spool_dir, Arc::clone(&bus));
    let fields: Arc<dyn FieldProvider> = Arc::new(PgFieldProvider::new(pool.clone()));
    let executor = ImportExecutor::new(pool.clone(), Arc::clone(&fields), Arc::clone(&bus));
    let analyzer = Arc::new(ColumnAnalyzer::new());

    // --- Cleanup job ---
    let cleanup_cancel = CancellationToken::new();
    let cleanup_handle = tokio::spawn(meridian_api::background::cleanup::run(
        CleanupSweep::new(pool.clone(), &config.spool_dir),
        config.cleanup_options(),
        Duration::from_secs(config.cleanup_interval_secs),
        cleanup_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        store,
        fields,
        analyzer,
        executor,
        bus,
        commits: TaskTracker::new(),
        commit_cancel: CancellationToken::new(),
    };

    // --- Router ---
    let app = build_app_router(state.clone(), &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop the cleanup job.
    cleanup_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), cleanup_handle).await;
    tracing::info!("Session cleanup job stopped");

    // Drain running commit runs. Runs that outlast the shutdown window
    // are cancelled; they abort between chunks and mark their session
    // failed, keeping already-committed chunks.
    state.commits.close();
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(drain, state.commits.wait())
        .await
        .is_err()
    {
        tracing::warn!("Commit runs still active, cancelling them");
        state.commit_cancel.cancel();
        state.commits.wait().await;
    }
    tracing::info!("Commit runs drained");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
