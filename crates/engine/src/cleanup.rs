//! Reclamation sweep for abandoned sessions, expired spools, and old
//! quarantine rows.
//!
//! Import sessions are ephemeral: the uploaded file and its
//! canonical row copy only exist to feed one wizard run. Users close
//! tabs, though, so anything that stops heartbeating eventually gets
//! swept: the session is failed, its spool directory removed, and
//! quarantine entries past their retention window pruned.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use meridian_core::session::should_reclaim;
use meridian_core::types::SessionId;
use meridian_db::repositories::{FailedImportRowRepo, ImportSessionRepo};
use meridian_db::DbPool;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;

/// Error message recorded on sessions the sweep gives up on.
const ABANDONED_MESSAGE: &str = "session abandoned before the import was started";

/// Thresholds for one sweep.
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Sessions and spool directories older than this are candidates.
    pub max_age: Duration,
    /// A heartbeat younger than this keeps a candidate session alive.
    pub heartbeat_stale: Duration,
    /// Quarantined rows are pruned once older than this.
    pub failed_row_retention: Duration,
    /// Report what a sweep would do without touching anything.
    pub dry_run: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            max_age: Duration::hours(24),
            heartbeat_stale: Duration::minutes(30),
            failed_row_retention: Duration::days(30),
            dry_run: false,
        }
    }
}

/// What one sweep did (or, when dry, would have done).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub sessions_failed: u64,
    pub spools_removed: u64,
    pub orphan_spools_removed: u64,
    pub failed_rows_pruned: u64,
}

/// Periodic sweep over session rows, the spool root, and the
/// quarantine table.
pub struct CleanupSweep {
    pool: DbPool,
    spool_root: PathBuf,
}

impl CleanupSweep {
    pub fn new(pool: DbPool, spool_root: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            spool_root: spool_root.into(),
        }
    }

    /// Run all three passes and report the tallies.
    pub async fn run(&self, options: &CleanupOptions) -> Result<CleanupReport, EngineError> {
        let now = Utc::now();
        let mut report = CleanupReport::default();

        self.sweep_sessions(options, now, &mut report).await?;
        self.sweep_orphan_spools(options, now, &mut report).await?;
        self.prune_failed_rows(options, now, &mut report).await?;

        info!(
            sessions_failed = report.sessions_failed,
            spools_removed = report.spools_removed,
            orphan_spools_removed = report.orphan_spools_removed,
            failed_rows_pruned = report.failed_rows_pruned,
            dry_run = options.dry_run,
            "cleanup sweep finished"
        );
        Ok(report)
    }

    /// Pass 1: sessions past `max_age`. Terminal ones keep their row
    /// (the counts are the durable outcome) and only lose the spool;
    /// the rest are reclaimed unless a live heartbeat vouches for them.
    async fn sweep_sessions(
        &self,
        options: &CleanupOptions,
        now: DateTime<Utc>,
        report: &mut CleanupReport,
    ) -> Result<(), EngineError> {
        let cutoff = now - options.max_age;
        let sessions = ImportSessionRepo::list_created_before(&self.pool, cutoff).await?;

        for session in sessions {
            let terminal = session.status().map(|s| s.is_terminal()).unwrap_or(false);
            if terminal {
                if self.remove_spool(session.id, options.dry_run).await? {
                    report.spools_removed += 1;
                }
                continue;
            }

            // The spool mtime tells when the upload last changed; a
            // session whose directory already vanished ages by its row.
            let blob_age = match self.spool_modified(session.id).await {
                Some(modified) => now - modified,
                None => now - session.created_at,
            };
            let heartbeat_age = session.last_heartbeat_at.map(|at| now - at);
            if !should_reclaim(blob_age, heartbeat_age, options.max_age, options.heartbeat_stale) {
                continue;
            }

            if options.dry_run {
                report.sessions_failed += 1;
            } else if ImportSessionRepo::fail_abandoned(&self.pool, session.id, ABANDONED_MESSAGE)
                .await?
            {
                warn!(
                    session_id = %session.id,
                    status = %session.status,
                    "reclaimed abandoned import session"
                );
                report.sessions_failed += 1;
            }
            if self.remove_spool(session.id, options.dry_run).await? {
                report.spools_removed += 1;
            }
        }
        Ok(())
    }

    /// Pass 2: spool directories with no session row. These are left
    /// behind when a destroy or a crash got between the row delete and
    /// the directory removal.
    async fn sweep_orphan_spools(
        &self,
        options: &CleanupOptions,
        now: DateTime<Utc>,
        report: &mut CleanupReport,
    ) -> Result<(), EngineError> {
        let mut entries = match tokio::fs::read_dir(&self.spool_root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        let mut candidates: Vec<SessionId> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Ok(id) = Uuid::parse_str(&name) else {
                continue;
            };
            // Young directories may belong to an upload whose session
            // row has not landed yet.
            let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
                continue;
            };
            if now - DateTime::<Utc>::from(modified) >= options.max_age {
                candidates.push(id);
            }
        }
        if candidates.is_empty() {
            return Ok(());
        }

        let existing: HashSet<SessionId> = ImportSessionRepo::existing_ids(&self.pool, &candidates)
            .await?
            .into_iter()
            .collect();
        for id in candidates {
            if existing.contains(&id) {
                continue;
            }
            if self.remove_spool(id, options.dry_run).await? {
                report.orphan_spools_removed += 1;
            }
        }
        Ok(())
    }

    /// Pass 3: quarantine entries past their retention window.
    async fn prune_failed_rows(
        &self,
        options: &CleanupOptions,
        now: DateTime<Utc>,
        report: &mut CleanupReport,
    ) -> Result<(), EngineError> {
        let cutoff = now - options.failed_row_retention;
        report.failed_rows_pruned = if options.dry_run {
            FailedImportRowRepo::count_older_than(&self.pool, cutoff).await? as u64
        } else {
            FailedImportRowRepo::delete_older_than(&self.pool, cutoff).await?
        };
        Ok(())
    }

    /// Remove one spool directory, tolerating its absence. Returns
    /// whether a directory was (or, dry, would have been) removed.
    async fn remove_spool(&self, id: SessionId, dry_run: bool) -> Result<bool, EngineError> {
        let dir = self.spool_root.join(id.to_string());
        match tokio::fs::metadata(&dir).await {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        }
        if dry_run {
            return Ok(true);
        }
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn spool_modified(&self, id: SessionId) -> Option<DateTime<Utc>> {
        let dir = self.spool_root.join(id.to_string());
        let modified = tokio::fs::metadata(&dir).await.ok()?.modified().ok()?;
        Some(modified.into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
