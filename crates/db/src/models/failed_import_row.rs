//! Quarantined row models.

use meridian_core::types::{SessionId, TenantId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `failed_import_rows` table: the original cell values
/// of one row that errored during a commit.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FailedImportRow {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub entity_type: String,
    pub row_number: i64,
    pub row_data: serde_json::Value,
    pub error_message: String,
    pub created_at: Timestamp,
}

/// DTO for quarantining a failed row.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFailedImportRow {
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub entity_type: String,
    pub row_number: i64,
    pub row_data: serde_json::Value,
    pub error_message: String,
}
