//! Batch entity-link resolution.
//!
//! Before a chunk of rows is planned, the distinct values of every
//! mapped link column are resolved to target ids: one query per
//! (link, matcher) instead of one per row. Matchers run in the link's
//! priority order, and a value claimed by an earlier matcher is not
//! retried by later ones.

use std::collections::{HashMap, HashSet};

use meridian_core::links::EntityLink;
use meridian_core::mapping::{ColumnMapping, MappingTarget};
use meridian_core::profiles::ImporterProfile;
use meridian_core::types::{RecordId, TenantId, UserId};
use meridian_db::repositories::{RecordRepo, TeamMemberRepo};
use meridian_db::DbPool;

use crate::error::EngineError;
use crate::spreadsheet::SourceRow;

/// Link target entity type that resolves against team members rather
/// than records.
pub const TEAM_MEMBER_TYPE: &str = "team_member";

/// What a raw link value resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTarget {
    Record(RecordId),
    TeamMember(UserId),
}

impl LinkTarget {
    pub fn id(&self) -> uuid::Uuid {
        match self {
            Self::Record(id) | Self::TeamMember(id) => *id,
        }
    }
}

/// Resolution results for one chunk, keyed by link key and then by the
/// normalized raw value.
#[derive(Debug, Default)]
pub struct ResolvedLinks {
    by_key: HashMap<String, HashMap<String, LinkTarget>>,
}

impl ResolvedLinks {
    /// The target a raw cell value resolved to, if any.
    pub fn get(&self, link_key: &str, raw: &str) -> Option<LinkTarget> {
        self.by_key.get(link_key)?.get(&normalize(raw)).copied()
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, link_key: &str, raw: &str, target: LinkTarget) {
        self.by_key
            .entry(link_key.to_string())
            .or_default()
            .insert(normalize(raw), target);
    }
}

/// Comparison key for link values. Matching is trim- and
/// case-insensitive on both sides.
fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Resolves link columns in batches.
#[derive(Clone)]
pub struct LinkResolver {
    pool: DbPool,
}

impl LinkResolver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Resolve every mapped link column of `rows` in one pass.
    pub async fn resolve_chunk(
        &self,
        tenant_id: TenantId,
        profile: &ImporterProfile,
        mappings: &[ColumnMapping],
        rows: &[SourceRow],
    ) -> Result<ResolvedLinks, EngineError> {
        let mut resolved = ResolvedLinks::default();

        for mapping in mappings {
            let MappingTarget::EntityLink { key } = &mapping.target else {
                continue;
            };
            let Some(link) = profile.link(key) else {
                continue;
            };

            let mut distinct: HashSet<String> = HashSet::new();
            for row in rows {
                let value = normalize(row.cell(mapping.source_index));
                if !value.is_empty() {
                    distinct.insert(value);
                }
            }

            let pending: Vec<String> = distinct.into_iter().collect();
            let matches = self.resolve_link(tenant_id, link, pending).await?;
            resolved.by_key.insert(key.clone(), matches);
        }

        Ok(resolved)
    }

    async fn resolve_link(
        &self,
        tenant_id: TenantId,
        link: &EntityLink,
        mut pending: Vec<String>,
    ) -> Result<HashMap<String, LinkTarget>, EngineError> {
        let mut matched: HashMap<String, LinkTarget> = HashMap::new();
        if pending.is_empty() {
            return Ok(matched);
        }

        if link.target_entity_type == TEAM_MEMBER_TYPE {
            // Emails are unique per tenant, so no tie-breaking needed.
            let members = TeamMemberRepo::find_by_emails(&self.pool, tenant_id, &pending).await?;
            for member in members {
                matched.insert(member.email.to_lowercase(), LinkTarget::TeamMember(member.id));
            }
            return Ok(matched);
        }

        for matcher in &link.matchable_fields {
            if pending.is_empty() {
                break;
            }
            let records = RecordRepo::find_by_field_values(
                &self.pool,
                tenant_id,
                &link.target_entity_type,
                matcher,
                &pending,
            )
            .await?;
            // Records arrive oldest first; the first claim on a value
            // stands, so duplicates resolve deterministically.
            for record in records {
                let Some(value) = record.data.get(matcher).and_then(|v| v.as_str()) else {
                    continue;
                };
                let value = normalize(value);
                matched
                    .entry(value)
                    .or_insert(LinkTarget::Record(record.id));
            }
            pending.retain(|v| !matched.contains_key(v));
        }

        Ok(matched)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
