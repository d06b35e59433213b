use std::path::PathBuf;

use meridian_engine::cleanup::CleanupOptions;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight commit runs before
    /// cancelling them (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Root directory for per-session spool directories.
    pub spool_dir: PathBuf,
    /// Largest accepted upload in bytes (default: 25 MiB).
    pub max_upload_bytes: usize,
    /// Age after which an abandoned session becomes reclaimable.
    pub session_max_age_hours: i64,
    /// Heartbeat silence after which an aged session counts as dead.
    pub heartbeat_stale_minutes: i64,
    /// How long quarantined failed rows are kept.
    pub failed_row_retention_days: i64,
    /// How often the cleanup sweep runs.
    pub cleanup_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                    |
    /// |-----------------------------|----------------------------|
    /// | `HOST`                      | `0.0.0.0`                  |
    /// | `PORT`                      | `3000`                     |
    /// | `CORS_ORIGINS`              | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                       |
    /// | `SPOOL_DIR`                 | `./data/spool`             |
    /// | `MAX_UPLOAD_BYTES`          | `26214400`                 |
    /// | `SESSION_MAX_AGE_HOURS`     | `24`                       |
    /// | `HEARTBEAT_STALE_MINUTES`   | `30`                       |
    /// | `FAILED_ROW_RETENTION_DAYS` | `30`                       |
    /// | `CLEANUP_INTERVAL_SECS`     | `3600`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let spool_dir: PathBuf = std::env::var("SPOOL_DIR")
            .unwrap_or_else(|_| "./data/spool".into())
            .into();

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| "26214400".into())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let session_max_age_hours: i64 = std::env::var("SESSION_MAX_AGE_HOURS")
            .unwrap_or_else(|_| "24".into())
            .parse()
            .expect("SESSION_MAX_AGE_HOURS must be a valid i64");

        let heartbeat_stale_minutes: i64 = std::env::var("HEARTBEAT_STALE_MINUTES")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("HEARTBEAT_STALE_MINUTES must be a valid i64");

        let failed_row_retention_days: i64 = std::env::var("FAILED_ROW_RETENTION_DAYS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("FAILED_ROW_RETENTION_DAYS must be a valid i64");

        let cleanup_interval_secs: u64 = std::env::var("CLEANUP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("CLEANUP_INTERVAL_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            spool_dir,
            max_upload_bytes,
            session_max_age_hours,
            heartbeat_stale_minutes,
            failed_row_retention_days,
            cleanup_interval_secs,
        }
    }

    /// Thresholds for the background cleanup sweep.
    pub fn cleanup_options(&self) -> CleanupOptions {
        CleanupOptions {
            max_age: chrono::Duration::hours(self.session_max_age_hours),
            heartbeat_stale: chrono::Duration::minutes(self.heartbeat_stale_minutes),
            failed_row_retention: chrono::Duration::days(self.failed_row_retention_days),
            dry_run: false,
        }
    }
}
