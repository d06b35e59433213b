//! Repository for tenants.

use meridian_core::types::TenantId;
use sqlx::PgPool;

use crate::models::tenant::{CreateTenant, Tenant};

/// Column list for `tenants`.
const COLUMNS: &str = "id, name, slug, created_at, updated_at";

/// Provides CRUD operations for tenants.
pub struct TenantRepo;

impl TenantRepo {
    /// Create a new tenant.
    pub async fn create(pool: &PgPool, input: &CreateTenant) -> Result<Tenant, sqlx::Error> {
        let sql = format!(
            "INSERT INTO tenants (name, slug) VALUES ($1, $2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tenant>(&sql)
            .bind(&input.name)
            .bind(&input.slug)
            .fetch_one(pool)
            .await
    }

    /// Find a tenant by id.
    pub async fn find_by_id(pool: &PgPool, id: TenantId) -> Result<Option<Tenant>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM tenants WHERE id = $1");
        sqlx::query_as::<_, Tenant>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a tenant by slug.
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Tenant>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM tenants WHERE slug = $1");
        sqlx::query_as::<_, Tenant>(&sql)
            .bind(slug)
            .fetch_optional(pool)
            .await
    }
}
