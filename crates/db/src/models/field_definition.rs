//! Custom field definition models.
//!
//! Built-in fields live in `meridian_core::profiles`; this table only
//! stores the fields a tenant added on top.

use meridian_core::fields::{Field, FieldKind};
use meridian_core::types::{TenantId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `field_definitions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FieldDefinition {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub entity_type: String,
    pub code: String,
    pub label: String,
    pub kind: Json<FieldKind>,
    pub is_required: bool,
    pub is_unique: bool,
    pub sort_order: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FieldDefinition {
    /// Convert to the core field type. Rows in this table are custom
    /// fields by definition.
    pub fn to_field(&self) -> Field {
        Field {
            code: self.code.clone(),
            label: self.label.clone(),
            kind: self.kind.0.clone(),
            required: self.is_required,
            unique: self.is_unique,
            is_custom: true,
        }
    }
}

/// DTO for creating a field definition.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFieldDefinition {
    pub tenant_id: TenantId,
    pub entity_type: String,
    pub code: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub sort_order: i32,
}
