//! Entity link configuration: how a mapped column referring to another
//! entity is matched and where the resolved id is stored.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Storage strategy
// ---------------------------------------------------------------------------

/// Where a resolved link id ends up on the importing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StorageStrategy {
    /// Scalar attribute on the record itself (e.g. `company_id`).
    ForeignKey { attribute: String },
    /// Row(s) in the polymorphic link pivot, synced after the record is
    /// saved.
    MorphToMany { relation: String },
    /// Dynamic custom-field slot keyed by field code.
    CustomFieldValue { code: String },
}

impl StorageStrategy {
    /// Pre-save strategies write into the record data before the upsert;
    /// `MorphToMany` needs the saved record id and runs after.
    pub fn is_pre_save(&self) -> bool {
        match self {
            Self::ForeignKey { .. } | Self::CustomFieldValue { .. } => true,
            Self::MorphToMany { .. } => false,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::ForeignKey { .. } => "foreign_key",
            Self::MorphToMany { .. } => "morph_to_many",
            Self::CustomFieldValue { .. } => "custom_field_value",
        }
    }
}

// ---------------------------------------------------------------------------
// Entity link
// ---------------------------------------------------------------------------

/// Static configuration for one linkable relationship of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityLink {
    /// Stable key a column mapping refers to (e.g. `"company"`).
    pub key: String,
    /// Human-facing label for mapping suggestions.
    pub label: String,
    /// Entity type the link points at.
    pub target_entity_type: String,
    /// Field codes on the target entity tried in priority order when
    /// resolving a raw cell value to a record id.
    pub matchable_fields: Vec<String>,
    pub storage: StorageStrategy,
    /// Required links turn an unresolved value into a row error instead
    /// of silently leaving the link unset.
    pub required: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
