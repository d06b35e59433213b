//! CRM record and link-edge models.

use meridian_core::types::{RecordId, TenantId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A row from the `records` table. Field values are a JSONB document
/// keyed by field code; the schema is whatever the tenant's fields say.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Record {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub entity_type: String,
    pub data: serde_json::Value,
    pub created_by: Option<UserId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a record.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecord {
    pub tenant_id: TenantId,
    pub entity_type: String,
    pub data: serde_json::Value,
    pub created_by: Option<UserId>,
}

// ---------------------------------------------------------------------------
// Record links
// ---------------------------------------------------------------------------

/// A row from the `record_links` table: one many-to-many edge.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RecordLink {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub record_id: RecordId,
    pub relation: String,
    pub target_type: String,
    pub target_id: Uuid,
    pub created_at: Timestamp,
}

/// DTO for asserting a link edge.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecordLink {
    pub tenant_id: TenantId,
    pub record_id: RecordId,
    pub relation: String,
    pub target_type: String,
    pub target_id: Uuid,
}
