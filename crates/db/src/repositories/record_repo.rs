//! Repository for CRM records.

use meridian_core::types::{RecordId, TenantId};
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::record::{CreateRecord, Record};

/// Column list for `records`.
const COLUMNS: &str = "id, tenant_id, entity_type, data, created_by, created_at, updated_at";

/// Provides CRUD operations for records.
///
/// The `_tx` variants run inside a caller-owned transaction so a chunk
/// of imported rows commits (or rolls back) as one unit.
pub struct RecordRepo;

impl RecordRepo {
    /// Insert a record.
    pub async fn create(pool: &PgPool, input: &CreateRecord) -> Result<Record, sqlx::Error> {
        let sql = format!(
            "INSERT INTO records (tenant_id, entity_type, data, created_by) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Record>(&sql)
            .bind(input.tenant_id)
            .bind(&input.entity_type)
            .bind(&input.data)
            .bind(input.created_by)
            .fetch_one(pool)
            .await
    }

    /// Insert a record inside the caller's transaction.
    pub async fn create_tx(
        tx: &mut Transaction<'_, Postgres>,
        input: &CreateRecord,
    ) -> Result<Record, sqlx::Error> {
        let sql = format!(
            "INSERT INTO records (tenant_id, entity_type, data, created_by) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Record>(&sql)
            .bind(input.tenant_id)
            .bind(&input.entity_type)
            .bind(&input.data)
            .bind(input.created_by)
            .fetch_one(&mut **tx)
            .await
    }

    /// Merge `patch` into a record's data document. Only keys present in
    /// the patch are overwritten; everything else is left alone.
    pub async fn merge_data_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: RecordId,
        patch: &serde_json::Value,
    ) -> Result<Record, sqlx::Error> {
        let sql = format!(
            "UPDATE records SET data = data || $2::jsonb, updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Record>(&sql)
            .bind(id)
            .bind(patch)
            .fetch_one(&mut **tx)
            .await
    }

    /// Find a record by id, scoped to a tenant.
    pub async fn find_for_tenant(
        pool: &PgPool,
        tenant_id: TenantId,
        id: RecordId,
    ) -> Result<Option<Record>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM records WHERE id = $1 AND tenant_id = $2");
        sqlx::query_as::<_, Record>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// All records whose `field` value equals any of `values`,
    /// case-insensitively. One round trip covers a whole chunk's worth
    /// of lookups; callers pass `values` already lowercased. Oldest
    /// first, so first-come resolution is deterministic on duplicates.
    pub async fn find_by_field_values(
        pool: &PgPool,
        tenant_id: TenantId,
        entity_type: &str,
        field: &str,
        values: &[String],
    ) -> Result<Vec<Record>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM records \
             WHERE tenant_id = $1 AND entity_type = $2 AND lower(data->>$3) = ANY($4) \
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, Record>(&sql)
            .bind(tenant_id)
            .bind(entity_type)
            .bind(field)
            .bind(values)
            .fetch_all(pool)
            .await
    }

    /// Count a tenant's records of one entity type.
    pub async fn count_for_tenant(
        pool: &PgPool,
        tenant_id: TenantId,
        entity_type: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT count(*) FROM records WHERE tenant_id = $1 AND entity_type = $2")
            .bind(tenant_id)
            .bind(entity_type)
            .fetch_one(pool)
            .await
    }
}
