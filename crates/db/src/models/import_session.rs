//! Import session models.
//!
//! One row per wizard run. The spreadsheet blob is spooled on disk under
//! the session id; the row carries everything else the wizard needs.

use meridian_core::mapping::ColumnMapping;
use meridian_core::session::{ImportOptions, SessionStatus};
use meridian_core::types::{SessionId, TenantId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `import_sessions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImportSession {
    pub id: SessionId,
    pub tenant_id: TenantId,
    pub created_by: Option<UserId>,
    pub entity_type: String,
    pub status: String,
    pub source_name: String,
    pub row_count: i64,
    pub column_count: i32,
    pub headers: Json<Vec<String>>,
    pub column_mappings: Option<Json<Vec<ColumnMapping>>>,
    pub options: Json<ImportOptions>,
    pub processed_rows: i64,
    pub create_count: i64,
    pub update_count: i64,
    pub skip_count: i64,
    pub error_count: i64,
    pub error_message: Option<String>,
    pub last_heartbeat_at: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ImportSession {
    /// Typed view of the status column. `None` for values this build
    /// does not know, which the CHECK constraint should make impossible.
    pub fn status(&self) -> Option<SessionStatus> {
        SessionStatus::from_str(&self.status)
    }
}

/// DTO for creating an import session.
///
/// The id is minted by the caller so the spool directory can be created
/// under it before the row exists.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateImportSession {
    pub id: SessionId,
    pub tenant_id: TenantId,
    pub created_by: Option<UserId>,
    pub entity_type: String,
    pub source_name: String,
}
