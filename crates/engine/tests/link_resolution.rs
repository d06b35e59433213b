//! Batch link resolution against real records and team members.
//!
//! - Matcher priority: a domain match outranks a name match
//! - Duplicate matches resolve to the oldest record
//! - Team-member emails match case-insensitively
//! - Resolution is tenant-scoped

use meridian_core::mapping::{ColumnMapping, MappingTarget};
use meridian_core::profiles;
use meridian_db::models::record::CreateRecord;
use meridian_db::models::team_member::CreateTeamMember;
use meridian_db::models::tenant::{CreateTenant, Tenant};
use meridian_db::repositories::{RecordRepo, TeamMemberRepo, TenantRepo};
use meridian_engine::resolver::{LinkResolver, LinkTarget};
use meridian_engine::spreadsheet::SourceRow;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_tenant(pool: &PgPool) -> Tenant {
    TenantRepo::create(
        pool,
        &CreateTenant {
            name: "Acme".to_string(),
            slug: format!("acme-{}", Uuid::new_v4()),
        },
    )
    .await
    .unwrap()
}

async fn company(pool: &PgPool, tenant: &Tenant, data: serde_json::Value) -> meridian_db::models::record::Record {
    RecordRepo::create(
        pool,
        &CreateRecord {
            tenant_id: tenant.id,
            entity_type: "company".to_string(),
            data,
            created_by: None,
        },
    )
    .await
    .unwrap()
}

fn company_link_mapping() -> Vec<ColumnMapping> {
    vec![ColumnMapping {
        source_index: 0,
        source_header: "Company".to_string(),
        target: MappingTarget::EntityLink {
            key: "company".to_string(),
        },
    }]
}

fn row(number: i64, cells: &[&str]) -> SourceRow {
    SourceRow {
        row_number: number,
        cells: cells.iter().map(|c| c.to_string()).collect(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_company_values_fall_back_from_domain_to_name(pool: PgPool) {
    let tenant = seed_tenant(&pool).await;
    let widgets = company(
        &pool,
        &tenant,
        json!({ "name": "Widgets", "domain": "widgets.test" }),
    )
    .await;
    let initech = company(&pool, &tenant, json!({ "name": "Initech" })).await;

    let resolver = LinkResolver::new(pool.clone());
    let profile = profiles::person_profile();
    let mappings = company_link_mapping();
    let rows = vec![
        row(1, &["widgets.test"]),
        row(2, &["INITECH"]),
        row(3, &["nowhere"]),
    ];
    let resolved = resolver
        .resolve_chunk(tenant.id, &profile, &mappings, &rows)
        .await
        .unwrap();

    assert_eq!(
        resolved.get("company", "widgets.test"),
        Some(LinkTarget::Record(widgets.id))
    );
    // Name matching is the fallback and also case-insensitive.
    assert_eq!(
        resolved.get("company", "Initech"),
        Some(LinkTarget::Record(initech.id))
    );
    assert_eq!(resolved.get("company", "nowhere"), None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_domain_match_outranks_name_match(pool: PgPool) {
    let tenant = seed_tenant(&pool).await;
    // One company's domain is another company's name.
    let by_domain = company(
        &pool,
        &tenant,
        json!({ "name": "Acme", "domain": "initech.test" }),
    )
    .await;
    company(
        &pool,
        &tenant,
        json!({ "name": "initech.test", "domain": "other.test" }),
    )
    .await;

    let resolver = LinkResolver::new(pool.clone());
    let resolved = resolver
        .resolve_chunk(
            tenant.id,
            &profiles::person_profile(),
            &company_link_mapping(),
            &[row(1, &["initech.test"])],
        )
        .await
        .unwrap();

    assert_eq!(
        resolved.get("company", "initech.test"),
        Some(LinkTarget::Record(by_domain.id))
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_oldest_record_wins_duplicate_values(pool: PgPool) {
    let tenant = seed_tenant(&pool).await;
    let first = company(&pool, &tenant, json!({ "name": "A", "domain": "dup.test" })).await;
    // Give created_at room to differ.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    company(&pool, &tenant, json!({ "name": "B", "domain": "dup.test" })).await;

    let resolver = LinkResolver::new(pool.clone());
    let resolved = resolver
        .resolve_chunk(
            tenant.id,
            &profiles::person_profile(),
            &company_link_mapping(),
            &[row(1, &["dup.test"])],
        )
        .await
        .unwrap();

    assert_eq!(
        resolved.get("company", "dup.test"),
        Some(LinkTarget::Record(first.id))
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_team_member_emails_match_case_insensitively(pool: PgPool) {
    let tenant = seed_tenant(&pool).await;
    let ada = TeamMemberRepo::create(
        &pool,
        &CreateTeamMember {
            tenant_id: tenant.id,
            name: "Ada".to_string(),
            email: "Ada@Demo.Test".to_string(),
        },
    )
    .await
    .unwrap();

    let resolver = LinkResolver::new(pool.clone());
    let mappings = vec![ColumnMapping {
        source_index: 0,
        source_header: "Owner".to_string(),
        target: MappingTarget::EntityLink {
            key: "account_owner".to_string(),
        },
    }];
    let resolved = resolver
        .resolve_chunk(
            tenant.id,
            &profiles::company_profile(),
            &mappings,
            &[row(1, &["  ADA@DEMO.TEST  "])],
        )
        .await
        .unwrap();

    assert_eq!(
        resolved.get("account_owner", "ada@demo.test"),
        Some(LinkTarget::TeamMember(ada.id))
    );
    // Lookups normalize the raw value the same way.
    assert_eq!(
        resolved.get("account_owner", " Ada@Demo.Test "),
        Some(LinkTarget::TeamMember(ada.id))
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_resolution_is_tenant_scoped(pool: PgPool) {
    let tenant = seed_tenant(&pool).await;
    let other = seed_tenant(&pool).await;
    company(
        &pool,
        &tenant,
        json!({ "name": "Widgets", "domain": "widgets.test" }),
    )
    .await;

    let resolver = LinkResolver::new(pool.clone());
    let resolved = resolver
        .resolve_chunk(
            other.id,
            &profiles::person_profile(),
            &company_link_mapping(),
            &[row(1, &["widgets.test"])],
        )
        .await
        .unwrap();

    assert_eq!(resolved.get("company", "widgets.test"), None);
}
