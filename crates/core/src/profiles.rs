//! Importer profiles: the static per-entity-type configuration the wizard
//! runs under.
//!
//! A profile names the matchable fields (in priority order) used to find
//! an existing record, the entity links the importer understands, and
//! whether the entity type insists on an identifying column being mapped.

use crate::fields::{Field, FieldKind};
use crate::links::{EntityLink, StorageStrategy};

/// Entity types the wizard accepts uploads for.
pub const SUPPORTED_ENTITY_TYPES: &[&str] = &["person", "company"];

/// Static configuration for importing one entity type.
#[derive(Debug, Clone)]
pub struct ImporterProfile {
    pub entity_type: String,
    /// Field codes used to match rows to existing records, in priority
    /// order. Only mapped ones participate.
    pub matchable_fields: Vec<String>,
    pub links: Vec<EntityLink>,
    /// When set, a run with no matchable field mapped errors every row
    /// rather than blindly creating duplicates.
    pub requires_unique_identifier: bool,
}

impl ImporterProfile {
    /// Extend the profile with one [`StorageStrategy::CustomFieldValue`]
    /// link per entity-typed custom field, so user-defined references
    /// import like built-in ones. Existing keys are never overridden.
    pub fn extend_with_custom_links(&mut self, fields: &[Field]) {
        for field in fields {
            let FieldKind::Link { target_entity_type } = &field.kind else {
                continue;
            };
            if !field.is_custom || self.links.iter().any(|l| l.key == field.code) {
                continue;
            }
            self.links.push(EntityLink {
                key: field.code.clone(),
                label: field.label.clone(),
                target_entity_type: target_entity_type.clone(),
                matchable_fields: default_matchers(target_entity_type),
                storage: StorageStrategy::CustomFieldValue {
                    code: field.code.clone(),
                },
                required: field.required,
            });
        }
    }

    /// Look up a configured link by key.
    pub fn link(&self, key: &str) -> Option<&EntityLink> {
        self.links.iter().find(|l| l.key == key)
    }
}

/// Resolve the profile for an entity type, if it is importable.
pub fn profile_for(entity_type: &str) -> Option<ImporterProfile> {
    match entity_type {
        "person" => Some(person_profile()),
        "company" => Some(company_profile()),
        _ => None,
    }
}

/// Built-in fields for an entity type. Tenant-defined custom fields are
/// appended to these at runtime.
pub fn native_fields(entity_type: &str) -> Vec<Field> {
    match entity_type {
        "person" => vec![
            Field::text("first_name", "First name"),
            Field::text("last_name", "Last name"),
            Field {
                code: "email".to_string(),
                label: "Email".to_string(),
                kind: FieldKind::Email,
                required: false,
                unique: true,
                is_custom: false,
            },
            Field::text("phone", "Phone"),
            Field::text("job_title", "Job title"),
            Field::text("city", "City"),
            Field::text("country", "Country"),
            Field {
                code: "birthday".to_string(),
                label: "Birthday".to_string(),
                kind: FieldKind::Date,
                required: false,
                unique: false,
                is_custom: false,
            },
            Field {
                code: "lifecycle_stage".to_string(),
                label: "Lifecycle stage".to_string(),
                kind: FieldKind::Choice {
                    options: vec![
                        "Lead".to_string(),
                        "Opportunity".to_string(),
                        "Customer".to_string(),
                        "Churned".to_string(),
                    ],
                    multiple: false,
                },
                required: false,
                unique: false,
                is_custom: false,
            },
        ],
        "company" => vec![
            Field {
                code: "name".to_string(),
                label: "Name".to_string(),
                kind: FieldKind::Text,
                required: true,
                unique: false,
                is_custom: false,
            },
            Field {
                code: "domain".to_string(),
                label: "Domain".to_string(),
                kind: FieldKind::Text,
                required: false,
                unique: true,
                is_custom: false,
            },
            Field::text("industry", "Industry"),
            Field {
                code: "employee_count".to_string(),
                label: "Employee count".to_string(),
                kind: FieldKind::Number,
                required: false,
                unique: false,
                is_custom: false,
            },
            Field {
                code: "annual_revenue".to_string(),
                label: "Annual revenue".to_string(),
                kind: FieldKind::Number,
                required: false,
                unique: false,
                is_custom: false,
            },
            Field::text("city", "City"),
            Field::text("country", "Country"),
        ],
        _ => Vec::new(),
    }
}

/// People are matched by email. Without an email column the import still
/// runs; every row simply creates.
pub fn person_profile() -> ImporterProfile {
    ImporterProfile {
        entity_type: "person".to_string(),
        matchable_fields: vec!["email".to_string()],
        links: vec![
            EntityLink {
                key: "company".to_string(),
                label: "Company".to_string(),
                target_entity_type: "company".to_string(),
                matchable_fields: vec!["domain".to_string(), "name".to_string()],
                storage: StorageStrategy::ForeignKey {
                    attribute: "company_id".to_string(),
                },
                required: false,
            },
            EntityLink {
                key: "account_owner".to_string(),
                label: "Account owner".to_string(),
                target_entity_type: "team_member".to_string(),
                matchable_fields: vec!["email".to_string()],
                storage: StorageStrategy::MorphToMany {
                    relation: "owners".to_string(),
                },
                required: false,
            },
        ],
        requires_unique_identifier: false,
    }
}

/// Companies are matched by domain first, then name, and refuse to run
/// without one of those mapped: bulk-creating unidentifiable companies
/// is never what the user meant.
pub fn company_profile() -> ImporterProfile {
    ImporterProfile {
        entity_type: "company".to_string(),
        matchable_fields: vec!["domain".to_string(), "name".to_string()],
        links: vec![EntityLink {
            key: "account_owner".to_string(),
            label: "Account owner".to_string(),
            target_entity_type: "team_member".to_string(),
            matchable_fields: vec!["email".to_string()],
            storage: StorageStrategy::MorphToMany {
                relation: "owners".to_string(),
            },
            required: false,
        }],
        requires_unique_identifier: true,
    }
}

/// Fallback matchers for link targets without their own profile.
fn default_matchers(entity_type: &str) -> Vec<String> {
    match profile_for(entity_type) {
        Some(profile) => profile.matchable_fields,
        None => vec!["name".to_string()],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
