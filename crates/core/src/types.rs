//! Shared identifier and timestamp aliases.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Tenant (workspace) identifier.
pub type TenantId = Uuid;

/// User identifier within a tenant.
pub type UserId = Uuid;

/// Import session identifier. Opaque to clients.
pub type SessionId = Uuid;

/// Stored record identifier.
pub type RecordId = Uuid;

/// UTC timestamp as stored in the database.
pub type Timestamp = DateTime<Utc>;
