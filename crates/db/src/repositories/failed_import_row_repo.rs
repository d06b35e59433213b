//! Repository for quarantined import rows.

use chrono::{DateTime, Utc};
use meridian_core::types::{SessionId, TenantId};
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::failed_import_row::{CreateFailedImportRow, FailedImportRow};

/// Column list for `failed_import_rows`.
const COLUMNS: &str = "id, tenant_id, session_id, entity_type, row_number, \
     row_data, error_message, created_at";

/// Provides operations for the failed-row quarantine.
pub struct FailedImportRowRepo;

impl FailedImportRowRepo {
    /// Quarantine a row inside the caller's (chunk) transaction. The
    /// row's own savepoint has already been rolled back by the time this
    /// runs, so the quarantine entry commits with the rest of the chunk.
    pub async fn create_tx(
        tx: &mut Transaction<'_, Postgres>,
        input: &CreateFailedImportRow,
    ) -> Result<FailedImportRow, sqlx::Error> {
        let sql = format!(
            "INSERT INTO failed_import_rows \
                (tenant_id, session_id, entity_type, row_number, row_data, error_message) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FailedImportRow>(&sql)
            .bind(input.tenant_id)
            .bind(input.session_id)
            .bind(&input.entity_type)
            .bind(input.row_number)
            .bind(&input.row_data)
            .bind(&input.error_message)
            .fetch_one(&mut **tx)
            .await
    }

    /// A session's quarantined rows in spreadsheet order.
    pub async fn list_for_session(
        pool: &PgPool,
        tenant_id: TenantId,
        session_id: SessionId,
    ) -> Result<Vec<FailedImportRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM failed_import_rows \
             WHERE tenant_id = $1 AND session_id = $2 \
             ORDER BY row_number"
        );
        sqlx::query_as::<_, FailedImportRow>(&sql)
            .bind(tenant_id)
            .bind(session_id)
            .fetch_all(pool)
            .await
    }

    /// How many rows a session quarantined.
    pub async fn count_for_session(
        pool: &PgPool,
        session_id: SessionId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT count(*) FROM failed_import_rows WHERE session_id = $1")
            .bind(session_id)
            .fetch_one(pool)
            .await
    }

    /// How many quarantine entries are older than `cutoff`.
    pub async fn count_older_than(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT count(*) FROM failed_import_rows WHERE created_at < $1")
            .bind(cutoff)
            .fetch_one(pool)
            .await
    }

    /// Prune quarantine entries older than `cutoff`, across all tenants.
    /// Returns the number of rows removed.
    pub async fn delete_older_than(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM failed_import_rows WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
