//! Per-tenant field metadata: built-in fields merged with the tenant's
//! custom field definitions, plus the importer profile extended with
//! custom entity links.

use async_trait::async_trait;
use meridian_core::fields::Field;
use meridian_core::profiles::{self, ImporterProfile};
use meridian_core::types::TenantId;
use meridian_db::repositories::FieldDefinitionRepo;
use meridian_db::DbPool;

use crate::error::EngineError;

/// Everything mapping and commit need to know about an entity type for
/// one tenant.
#[derive(Debug, Clone)]
pub struct EntityFields {
    /// Importable fields: native first, then custom in display order.
    pub fields: Vec<Field>,
    pub profile: ImporterProfile,
}

impl EntityFields {
    /// Find a field by code.
    pub fn field(&self, code: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.code == code)
    }
}

/// Source of per-tenant field metadata. A trait seam so the executor
/// and analyzer can run against canned metadata in tests.
#[async_trait]
pub trait FieldProvider: Send + Sync {
    async fn entity_fields(
        &self,
        tenant_id: TenantId,
        entity_type: &str,
    ) -> Result<EntityFields, EngineError>;
}

/// Field metadata backed by the `field_definitions` table.
#[derive(Clone)]
pub struct PgFieldProvider {
    pool: DbPool,
}

impl PgFieldProvider {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FieldProvider for PgFieldProvider {
    async fn entity_fields(
        &self,
        tenant_id: TenantId,
        entity_type: &str,
    ) -> Result<EntityFields, EngineError> {
        let mut profile = profiles::profile_for(entity_type)
            .ok_or_else(|| EngineError::UnknownEntityType(entity_type.to_string()))?;

        let mut fields = profiles::native_fields(entity_type);
        let custom =
            FieldDefinitionRepo::list_for_entity(&self.pool, tenant_id, entity_type).await?;
        fields.extend(custom.iter().map(|def| def.to_field()));

        profile.extend_with_custom_links(&fields);
        Ok(EntityFields { fields, profile })
    }
}
