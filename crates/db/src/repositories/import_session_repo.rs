//! Repository for import session rows.

use chrono::{DateTime, Utc};
use meridian_core::mapping::ColumnMapping;
use meridian_core::outcome::OutcomeCounts;
use meridian_core::session::{ImportOptions, SessionStatus};
use meridian_core::types::{SessionId, TenantId};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::import_session::{CreateImportSession, ImportSession};

/// Column list for `import_sessions`.
const COLUMNS: &str = "id, tenant_id, created_by, entity_type, status, source_name, \
     row_count, column_count, headers, column_mappings, options, \
     processed_rows, create_count, update_count, skip_count, error_count, \
     error_message, last_heartbeat_at, started_at, finished_at, \
     created_at, updated_at";

/// Provides CRUD and lifecycle operations for import sessions.
pub struct ImportSessionRepo;

impl ImportSessionRepo {
    /// Insert a new session in 'uploading' status.
    pub async fn create(
        pool: &PgPool,
        input: &CreateImportSession,
    ) -> Result<ImportSession, sqlx::Error> {
        let sql = format!(
            "INSERT INTO import_sessions (id, tenant_id, created_by, entity_type, source_name) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportSession>(&sql)
            .bind(input.id)
            .bind(input.tenant_id)
            .bind(input.created_by)
            .bind(&input.entity_type)
            .bind(&input.source_name)
            .fetch_one(pool)
            .await
    }

    /// Find a session by id, scoped to a tenant.
    pub async fn find_for_tenant(
        pool: &PgPool,
        tenant_id: TenantId,
        id: SessionId,
    ) -> Result<Option<ImportSession>, sqlx::Error> {
        let sql =
            format!("SELECT {COLUMNS} FROM import_sessions WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, ImportSession>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// Find a session by id alone. Background jobs use this; API paths
    /// go through [`Self::find_for_tenant`].
    pub async fn find_by_id(
        pool: &PgPool,
        id: SessionId,
    ) -> Result<Option<ImportSession>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM import_sessions WHERE id = $1");
        sqlx::query_as::<_, ImportSession>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a tenant's sessions, newest first.
    pub async fn list_for_tenant(
        pool: &PgPool,
        tenant_id: TenantId,
    ) -> Result<Vec<ImportSession>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM import_sessions \
             WHERE tenant_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, ImportSession>(&sql)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }

    /// Record the parsed spreadsheet shape and move to 'mapping'.
    pub async fn mark_parsed(
        pool: &PgPool,
        id: SessionId,
        row_count: i64,
        column_count: i32,
        headers: &[String],
    ) -> Result<Option<ImportSession>, sqlx::Error> {
        let sql = format!(
            "UPDATE import_sessions SET \
                row_count = $2, column_count = $3, headers = $4, \
                status = 'mapping', updated_at = now() \
             WHERE id = $1 AND status = 'uploading' \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportSession>(&sql)
            .bind(id)
            .bind(row_count)
            .bind(column_count)
            .bind(Json(headers))
            .fetch_optional(pool)
            .await
    }

    /// Save mappings and options; the session moves to 'reviewing'.
    ///
    /// Only allowed from 'mapping' or 'reviewing'; once a run starts
    /// the mappings are frozen.
    pub async fn set_mappings(
        pool: &PgPool,
        tenant_id: TenantId,
        id: SessionId,
        mappings: &[ColumnMapping],
        options: &ImportOptions,
    ) -> Result<Option<ImportSession>, sqlx::Error> {
        let sql = format!(
            "UPDATE import_sessions SET \
                column_mappings = $3, options = $4, \
                status = 'reviewing', updated_at = now() \
             WHERE id = $1 AND tenant_id = $2 AND status IN ('mapping', 'reviewing') \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportSession>(&sql)
            .bind(id)
            .bind(tenant_id)
            .bind(Json(mappings))
            .bind(Json(options))
            .fetch_optional(pool)
            .await
    }

    /// Refresh the keep-alive timestamp. Returns false when the session
    /// does not exist in this tenant.
    pub async fn touch_heartbeat(
        pool: &PgPool,
        tenant_id: TenantId,
        id: SessionId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE import_sessions SET last_heartbeat_at = now(), updated_at = now() \
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically claim the session for a commit run.
    ///
    /// Serialised on a per-session advisory lock so two racing commit
    /// requests cannot both observe a claimable status. Returns true
    /// only for the caller that performed the transition to 'importing'.
    pub async fn try_begin_import(
        pool: &PgPool,
        tenant_id: TenantId,
        id: SessionId,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query("SET LOCAL lock_timeout = '10s'")
            .execute(&mut *tx)
            .await?;
        let locked = sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(id)
            .execute(&mut *tx)
            .await;
        if let Err(err) = locked {
            // Lock timeout means another caller holds the session right
            // now, which answers the question: we did not win.
            if let sqlx::Error::Database(db_err) = &err {
                if db_err.code().as_deref() == Some("55P03") {
                    return Ok(false);
                }
            }
            return Err(err);
        }
        let claimed = sqlx::query(
            "UPDATE import_sessions SET \
                status = 'importing', started_at = now(), updated_at = now() \
             WHERE id = $1 AND tenant_id = $2 AND status IN ('mapping', 'reviewing')",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(claimed.rows_affected() > 0)
    }

    /// Persist progress counters mid-run.
    pub async fn set_progress(
        pool: &PgPool,
        id: SessionId,
        processed_rows: i64,
        counts: &OutcomeCounts,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE import_sessions SET \
                processed_rows = $2, create_count = $3, update_count = $4, \
                skip_count = $5, error_count = $6, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(processed_rows)
        .bind(counts.create_count)
        .bind(counts.update_count)
        .bind(counts.skip_count)
        .bind(counts.error_count)
        .execute(pool)
        .await
        .map(|_| ())
    }

    /// Record the terminal status of a run, stamping `finished_at`.
    pub async fn finish(
        pool: &PgPool,
        id: SessionId,
        status: SessionStatus,
        error_message: Option<&str>,
    ) -> Result<Option<ImportSession>, sqlx::Error> {
        let sql = format!(
            "UPDATE import_sessions SET \
                status = $2, error_message = $3, \
                finished_at = now(), updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportSession>(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(error_message)
            .fetch_optional(pool)
            .await
    }

    /// Fail a session that is not already terminal. Used by cleanup for
    /// abandoned sessions; returns false when the session had finished
    /// (or vanished) in the meantime.
    pub async fn fail_abandoned(
        pool: &PgPool,
        id: SessionId,
        message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE import_sessions SET \
                status = 'failed', error_message = $2, \
                finished_at = now(), updated_at = now() \
             WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(id)
        .bind(message)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Sessions created before `cutoff`, oldest first. Cleanup decides
    /// per session what (if anything) to reclaim.
    pub async fn list_created_before(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ImportSession>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM import_sessions \
             WHERE created_at < $1 ORDER BY created_at"
        );
        sqlx::query_as::<_, ImportSession>(&sql)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Which of `ids` still have a session row. The orphan spool sweep
    /// checks a whole directory listing in one round trip.
    pub async fn existing_ids(
        pool: &PgPool,
        ids: &[SessionId],
    ) -> Result<Vec<SessionId>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM import_sessions WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Delete a session row. Returns true when a row was removed.
    pub async fn delete(
        pool: &PgPool,
        tenant_id: TenantId,
        id: SessionId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM import_sessions WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
