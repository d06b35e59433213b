//! Repository for record link edges.

use meridian_core::types::RecordId;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::record::{CreateRecordLink, RecordLink};

/// Column list for `record_links`.
const COLUMNS: &str = "id, tenant_id, record_id, relation, target_type, target_id, created_at";

/// Provides operations for many-to-many link edges.
pub struct RecordLinkRepo;

impl RecordLinkRepo {
    /// Assert an edge inside the caller's transaction. Duplicate edges
    /// are ignored, so re-importing a row is a no-op for links it
    /// already made. Returns true when a new edge was written.
    pub async fn link_tx(
        tx: &mut Transaction<'_, Postgres>,
        input: &CreateRecordLink,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO record_links (tenant_id, record_id, relation, target_type, target_id) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT ON CONSTRAINT uq_record_links_edge DO NOTHING",
        )
        .bind(input.tenant_id)
        .bind(input.record_id)
        .bind(&input.relation)
        .bind(&input.target_type)
        .bind(input.target_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Edges for a record, oldest first.
    pub async fn list_for_record(
        pool: &PgPool,
        record_id: RecordId,
    ) -> Result<Vec<RecordLink>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM record_links \
             WHERE record_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, RecordLink>(&sql)
            .bind(record_id)
            .fetch_all(pool)
            .await
    }
}
