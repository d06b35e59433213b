//! Team member models. Account-owner columns resolve against these rows.

use meridian_core::types::{TenantId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `team_members` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TeamMember {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a team member.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeamMember {
    pub tenant_id: TenantId,
    pub name: String,
    pub email: String,
}
