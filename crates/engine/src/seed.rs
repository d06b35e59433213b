//! Demo workspace seeding for local development.
//!
//! Gives a fresh database something to import into: a tenant, team
//! members for account-owner columns, a custom field per entity type,
//! and a handful of records so update matching has targets.

use meridian_core::fields::FieldKind;
use meridian_db::models::field_definition::CreateFieldDefinition;
use meridian_db::models::record::CreateRecord;
use meridian_db::models::team_member::CreateTeamMember;
use meridian_db::models::tenant::{CreateTenant, Tenant};
use meridian_db::repositories::{FieldDefinitionRepo, RecordRepo, TeamMemberRepo, TenantRepo};
use meridian_db::DbPool;
use serde_json::json;
use tracing::info;

use crate::error::EngineError;

/// Slug of the workspace the seed owns.
pub const DEMO_TENANT_SLUG: &str = "demo";

/// Seed the demo workspace. Idempotent: when the slug already exists
/// the tenant is returned untouched.
pub async fn seed_demo_data(pool: &DbPool) -> Result<Tenant, EngineError> {
    if let Some(existing) = TenantRepo::find_by_slug(pool, DEMO_TENANT_SLUG).await? {
        info!(tenant_id = %existing.id, "demo workspace already seeded");
        return Ok(existing);
    }

    let tenant = TenantRepo::create(
        pool,
        &CreateTenant {
            name: "Demo Workspace".to_string(),
            slug: DEMO_TENANT_SLUG.to_string(),
        },
    )
    .await?;

    for (name, email) in [
        ("Ada Lovelace", "ada@demo.test"),
        ("Grace Hopper", "grace@demo.test"),
        ("Annie Easley", "annie@demo.test"),
    ] {
        TeamMemberRepo::create(
            pool,
            &CreateTeamMember {
                tenant_id: tenant.id,
                name: name.to_string(),
                email: email.to_string(),
            },
        )
        .await?;
    }

    FieldDefinitionRepo::create(
        pool,
        &CreateFieldDefinition {
            tenant_id: tenant.id,
            entity_type: "company".to_string(),
            code: "tier".to_string(),
            label: "Tier".to_string(),
            kind: FieldKind::Choice {
                options: vec![
                    "Strategic".to_string(),
                    "Growth".to_string(),
                    "Starter".to_string(),
                ],
                multiple: false,
            },
            is_required: false,
            is_unique: false,
            sort_order: 0,
        },
    )
    .await?;
    FieldDefinitionRepo::create(
        pool,
        &CreateFieldDefinition {
            tenant_id: tenant.id,
            entity_type: "person".to_string(),
            code: "linkedin_url".to_string(),
            label: "LinkedIn URL".to_string(),
            kind: FieldKind::Text,
            is_required: false,
            is_unique: false,
            sort_order: 0,
        },
    )
    .await?;

    let acme = RecordRepo::create(
        pool,
        &CreateRecord {
            tenant_id: tenant.id,
            entity_type: "company".to_string(),
            data: json!({
                "name": "Acme Corporation",
                "domain": "acme.test",
                "industry": "Manufacturing",
                "employee_count": 250,
            }),
            created_by: None,
        },
    )
    .await?;
    RecordRepo::create(
        pool,
        &CreateRecord {
            tenant_id: tenant.id,
            entity_type: "company".to_string(),
            data: json!({
                "name": "Globex",
                "domain": "globex.test",
                "industry": "Energy",
            }),
            created_by: None,
        },
    )
    .await?;
    RecordRepo::create(
        pool,
        &CreateRecord {
            tenant_id: tenant.id,
            entity_type: "person".to_string(),
            data: json!({
                "first_name": "Margaret",
                "last_name": "Hamilton",
                "email": "margaret@acme.test",
                "company_id": acme.id.to_string(),
                "lifecycle_stage": "Customer",
            }),
            created_by: None,
        },
    )
    .await?;

    info!(tenant_id = %tenant.id, "seeded demo workspace");
    Ok(tenant)
}
