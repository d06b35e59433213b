//! Repository for team members.

use meridian_core::types::TenantId;
use sqlx::PgPool;

use crate::models::team_member::{CreateTeamMember, TeamMember};

/// Column list for `team_members`.
const COLUMNS: &str = "id, tenant_id, name, email, created_at, updated_at";

/// Provides CRUD operations for team members.
pub struct TeamMemberRepo;

impl TeamMemberRepo {
    /// Create a new team member.
    pub async fn create(
        pool: &PgPool,
        input: &CreateTeamMember,
    ) -> Result<TeamMember, sqlx::Error> {
        let sql = format!(
            "INSERT INTO team_members (tenant_id, name, email) VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TeamMember>(&sql)
            .bind(input.tenant_id)
            .bind(&input.name)
            .bind(&input.email)
            .fetch_one(pool)
            .await
    }

    /// Members whose email matches any of `emails`, case-insensitively.
    /// Callers pass `emails` already lowercased.
    pub async fn find_by_emails(
        pool: &PgPool,
        tenant_id: TenantId,
        emails: &[String],
    ) -> Result<Vec<TeamMember>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM team_members \
             WHERE tenant_id = $1 AND lower(email) = ANY($2)"
        );
        sqlx::query_as::<_, TeamMember>(&sql)
            .bind(tenant_id)
            .bind(emails)
            .fetch_all(pool)
            .await
    }

    /// List a tenant's team members by name.
    pub async fn list_for_tenant(
        pool: &PgPool,
        tenant_id: TenantId,
    ) -> Result<Vec<TeamMember>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM team_members \
             WHERE tenant_id = $1 ORDER BY name"
        );
        sqlx::query_as::<_, TeamMember>(&sql)
            .bind(tenant_id)
            .fetch_all(pool)
            .await
    }
}
