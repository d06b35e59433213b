//! Repository for custom field definitions.

use meridian_core::types::TenantId;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::field_definition::{CreateFieldDefinition, FieldDefinition};

/// Column list for `field_definitions`.
const COLUMNS: &str = "id, tenant_id, entity_type, code, label, kind, \
     is_required, is_unique, sort_order, created_at, updated_at";

/// Provides CRUD operations for custom field definitions.
pub struct FieldDefinitionRepo;

impl FieldDefinitionRepo {
    /// Create a new field definition.
    pub async fn create(
        pool: &PgPool,
        input: &CreateFieldDefinition,
    ) -> Result<FieldDefinition, sqlx::Error> {
        let sql = format!(
            "INSERT INTO field_definitions \
                (tenant_id, entity_type, code, label, kind, is_required, is_unique, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FieldDefinition>(&sql)
            .bind(input.tenant_id)
            .bind(&input.entity_type)
            .bind(&input.code)
            .bind(&input.label)
            .bind(Json(&input.kind))
            .bind(input.is_required)
            .bind(input.is_unique)
            .bind(input.sort_order)
            .fetch_one(pool)
            .await
    }

    /// A tenant's custom fields for one entity type, in display order.
    pub async fn list_for_entity(
        pool: &PgPool,
        tenant_id: TenantId,
        entity_type: &str,
    ) -> Result<Vec<FieldDefinition>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM field_definitions \
             WHERE tenant_id = $1 AND entity_type = $2 \
             ORDER BY sort_order, code"
        );
        sqlx::query_as::<_, FieldDefinition>(&sql)
            .bind(tenant_id)
            .bind(entity_type)
            .fetch_all(pool)
            .await
    }

    /// Delete a field definition. Returns true when a row was removed.
    pub async fn delete(pool: &PgPool, tenant_id: TenantId, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM field_definitions WHERE id = $1 AND tenant_id = $2")
            .bind(id)
            .bind(tenant_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
