//! Import execution: the dry-run preview and the chunked transactional
//! commit.
//!
//! Both paths stream the canonical row file and classify each row with
//! the same planner, so what the preview promises is what the commit
//! does. A commit writes one transaction per chunk; inside it every row
//! gets a savepoint, so a bad row is quarantined without losing its
//! chunk, while infrastructure errors abort the run with everything
//! already committed left in place.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use meridian_core::links::StorageStrategy;
use meridian_core::mapping::{
    is_blank_row, mapped_column_indexes, ColumnMapping, MappingTarget,
};
use meridian_core::outcome::{ImportPreviewResult, OutcomeCounts, RowAction};
use meridian_core::profiles::ImporterProfile;
use meridian_core::rules::convert_value;
use meridian_core::session::{ImportOptions, SessionStatus};
use meridian_core::types::{RecordId, SessionId, TenantId, UserId};
use meridian_db::models::failed_import_row::CreateFailedImportRow;
use meridian_db::models::import_session::ImportSession;
use meridian_db::models::record::{CreateRecord, CreateRecordLink};
use meridian_db::repositories::{
    FailedImportRowRepo, ImportSessionRepo, RecordLinkRepo, RecordRepo,
};
use meridian_db::DbPool;
use meridian_events::{EventBus, ImportEvent};
use serde_json::{Map, Value};
use sqlx::{Acquire, Postgres, Transaction};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::EngineError;
use crate::fields::{EntityFields, FieldProvider};
use crate::resolver::{LinkResolver, LinkTarget, ResolvedLinks, TEAM_MEMBER_TYPE};
use crate::spreadsheet::{RowReader, SourceRow};

/// Attempts per chunk before a transient conflict aborts the run.
const MAX_CHUNK_ATTEMPTS: u32 = 3;

const RETRY_BACKOFF: std::time::Duration = std::time::Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Run context and row plans
// ---------------------------------------------------------------------------

/// Everything a run needs, resolved once up front.
struct RunContext {
    tenant_id: TenantId,
    session_id: SessionId,
    created_by: Option<UserId>,
    entity_type: String,
    headers: Vec<String>,
    mappings: Vec<ColumnMapping>,
    mapped_indexes: Vec<usize>,
    options: ImportOptions,
    entity: EntityFields,
    /// Highest-priority mapped matchable field, as (field code, column).
    active_matcher: Option<(String, usize)>,
    chunk_size: usize,
}

/// What to do with one row.
enum RowPlan {
    Skip,
    Error { message: String },
    Write(WritePlan),
}

struct WritePlan {
    /// Existing record to update; `None` creates.
    matched: Option<RecordId>,
    /// Normalized identifying value, for registering creates so later
    /// duplicates update instead of creating again.
    matcher_value: Option<String>,
    /// Converted values keyed by field code, pre-save link ids included.
    data: Map<String, Value>,
    /// Link edges written after the record is saved.
    edges: Vec<PendingEdge>,
}

struct PendingEdge {
    relation: String,
    target_type: String,
    target_id: uuid::Uuid,
}

/// How a commit run ended.
enum RunEnd {
    Completed {
        processed: i64,
        counts: OutcomeCounts,
    },
    Aborted {
        processed: i64,
        counts: OutcomeCounts,
        message: String,
    },
    /// The session row was deleted out from under the run.
    SessionGone,
}

impl RunEnd {
    fn aborted(processed: i64, counts: OutcomeCounts, message: impl ToString) -> Self {
        Self::Aborted {
            processed,
            counts,
            message: message.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs previews and commits for claimed sessions.
#[derive(Clone)]
pub struct ImportExecutor {
    pool: DbPool,
    fields: Arc<dyn FieldProvider>,
    resolver: LinkResolver,
    bus: Arc<EventBus>,
}

impl ImportExecutor {
    pub fn new(pool: DbPool, fields: Arc<dyn FieldProvider>, bus: Arc<EventBus>) -> Self {
        Self {
            resolver: LinkResolver::new(pool.clone()),
            pool,
            fields,
            bus,
        }
    }

    /// Dry run: classify every row without writing anything.
    pub async fn preview(
        &self,
        session: &ImportSession,
        rows_path: &Path,
    ) -> Result<ImportPreviewResult, EngineError> {
        let ctx = self.build_context(session).await?;
        let mut reader = RowReader::open(rows_path)?;
        let mut result = ImportPreviewResult::default();
        let mut known: HashMap<String, RecordId> = HashMap::new();

        loop {
            let (returned, rows) = read_chunk(reader, ctx.chunk_size).await?;
            reader = returned;
            if rows.is_empty() {
                break;
            }
            let resolved = self
                .resolver
                .resolve_chunk(ctx.tenant_id, &ctx.entity.profile, &ctx.mappings, &rows)
                .await?;
            for (value, id) in self.lookup_matches(&ctx, &rows).await? {
                known.entry(value).or_insert(id);
            }

            for row in &rows {
                match plan_row(&ctx, row, &resolved, &known) {
                    RowPlan::Skip => result.record(RowAction::Skip, row.row_number, Map::new()),
                    RowPlan::Error { message } => {
                        result.record(RowAction::Error, row.row_number, Map::new());
                        result.record_error(row.row_number, message);
                    }
                    RowPlan::Write(write) => {
                        let action = if write.matched.is_some() {
                            RowAction::Update
                        } else {
                            RowAction::Create
                        };
                        if action == RowAction::Create {
                            if let Some(value) = &write.matcher_value {
                                // Placeholder id: later duplicates of this
                                // value classify as updates of the row that
                                // will create the record.
                                known.entry(value.clone()).or_insert(RecordId::nil());
                            }
                        }
                        result.record(action, row.row_number, write.data);
                    }
                }
            }
        }

        info!(
            session_id = %session.id,
            creates = result.counts.create_count,
            updates = result.counts.update_count,
            skips = result.counts.skip_count,
            errors = result.counts.error_count,
            "dry run produced"
        );
        Ok(result)
    }

    /// Execute a claimed session to a terminal status.
    ///
    /// The caller must have won [`crate::store::SessionStore::try_begin_import`];
    /// this method assumes the session is in 'importing'. Returns the
    /// finished session, or `None` when the row was deleted mid-run.
    pub async fn run_commit(
        &self,
        session: ImportSession,
        rows_path: PathBuf,
        cancel: CancellationToken,
    ) -> Result<Option<ImportSession>, EngineError> {
        let session_id = session.id;
        let tenant_id = session.tenant_id;
        info!(session_id = %session_id, rows = session.row_count, "commit run started");
        self.bus.publish(ImportEvent::CommitStarted {
            session_id,
            tenant_id,
            total_rows: session.row_count,
        });

        let end = self.commit_run(&session, &rows_path, &cancel).await;

        let (status, counts, processed, message) = match end {
            RunEnd::Completed { processed, counts } => {
                (SessionStatus::Completed, counts, processed, None)
            }
            RunEnd::Aborted {
                processed,
                counts,
                message,
            } => {
                error!(session_id = %session_id, error = %message, "commit run aborted");
                (SessionStatus::Failed, counts, processed, Some(message))
            }
            RunEnd::SessionGone => {
                info!(session_id = %session_id, "session deleted mid-run, stopping");
                return Ok(None);
            }
        };

        ImportSessionRepo::set_progress(&self.pool, session_id, processed, &counts).await?;
        let finished =
            ImportSessionRepo::finish(&self.pool, session_id, status, message.as_deref()).await?;
        self.bus.publish(ImportEvent::CommitFinished {
            session_id,
            tenant_id,
            status,
            counts,
        });
        info!(
            session_id = %session_id,
            status = %status,
            created = counts.create_count,
            updated = counts.update_count,
            skipped = counts.skip_count,
            errors = counts.error_count,
            "commit run finished"
        );
        Ok(finished)
    }

    async fn commit_run(
        &self,
        session: &ImportSession,
        rows_path: &Path,
        cancel: &CancellationToken,
    ) -> RunEnd {
        let mut counts = OutcomeCounts::default();
        let mut processed = 0i64;

        let ctx = match self.build_context(session).await {
            Ok(ctx) => ctx,
            Err(err) => return RunEnd::aborted(processed, counts, err),
        };
        let mut reader = match RowReader::open(rows_path) {
            Ok(reader) => reader,
            Err(err) => return RunEnd::aborted(processed, counts, err),
        };
        let mut known: HashMap<String, RecordId> = HashMap::new();

        loop {
            if cancel.is_cancelled() {
                return RunEnd::aborted(processed, counts, "import interrupted by shutdown");
            }
            // A destroyed session means stop, not fail: there is no row
            // left to carry a terminal status.
            match ImportSessionRepo::find_by_id(&self.pool, session.id).await {
                Ok(Some(_)) => {}
                Ok(None) => return RunEnd::SessionGone,
                Err(err) => return RunEnd::aborted(processed, counts, err),
            }

            let (returned, rows) = match read_chunk(reader, ctx.chunk_size).await {
                Ok(pair) => pair,
                Err(err) => return RunEnd::aborted(processed, counts, err),
            };
            reader = returned;
            if rows.is_empty() {
                break;
            }

            match self.commit_chunk(&ctx, &rows, &mut known).await {
                Ok(chunk_counts) => counts.absorb(chunk_counts),
                Err(err) => return RunEnd::aborted(processed, counts, err),
            }
            processed += rows.len() as i64;

            if let Err(err) =
                ImportSessionRepo::set_progress(&self.pool, session.id, processed, &counts).await
            {
                return RunEnd::aborted(processed, counts, err);
            }
            self.bus.publish(ImportEvent::CommitProgress {
                session_id: session.id,
                tenant_id: session.tenant_id,
                processed_rows: processed,
                successful_rows: counts.successful(),
                failed_rows: counts.error_count,
            });
        }

        RunEnd::Completed { processed, counts }
    }

    /// Resolve, plan, and write one chunk, retrying transient conflicts
    /// with the same rows.
    async fn commit_chunk(
        &self,
        ctx: &RunContext,
        rows: &[SourceRow],
        known: &mut HashMap<String, RecordId>,
    ) -> Result<OutcomeCounts, EngineError> {
        let resolved = self
            .resolver
            .resolve_chunk(ctx.tenant_id, &ctx.entity.profile, &ctx.mappings, rows)
            .await?;
        for (value, id) in self.lookup_matches(ctx, rows).await? {
            known.entry(value).or_insert(id);
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_commit_chunk(ctx, rows, &resolved, known).await {
                Ok((counts, matches)) => {
                    *known = matches;
                    return Ok(counts);
                }
                Err(err) if attempt < MAX_CHUNK_ATTEMPTS && is_retryable(&err) => {
                    warn!(attempt, error = %err, "chunk hit a transient conflict, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One attempt at writing a chunk in a single transaction.
    ///
    /// Works on a copy of the match map so a retried attempt never sees
    /// record ids from a rolled-back one.
    async fn try_commit_chunk(
        &self,
        ctx: &RunContext,
        rows: &[SourceRow],
        resolved: &ResolvedLinks,
        base_matches: &HashMap<String, RecordId>,
    ) -> Result<(OutcomeCounts, HashMap<String, RecordId>), EngineError> {
        let mut matches = base_matches.clone();
        let mut counts = OutcomeCounts::default();
        let mut tx = self.pool.begin().await?;

        for row in rows {
            match plan_row(ctx, row, resolved, &matches) {
                RowPlan::Skip => counts.record(RowAction::Skip),
                RowPlan::Error { message } => {
                    quarantine(&mut tx, ctx, row, &message).await?;
                    counts.record(RowAction::Error);
                }
                RowPlan::Write(write) => {
                    let action = if write.matched.is_some() {
                        RowAction::Update
                    } else {
                        RowAction::Create
                    };
                    // Savepoint per row: an integrity failure rolls back
                    // this row alone, not the chunk.
                    let sp = tx.begin().await?;
                    match apply_write(sp, ctx, &write).await {
                        Ok(record_id) => {
                            if write.matched.is_none() {
                                if let Some(value) = &write.matcher_value {
                                    matches.entry(value.clone()).or_insert(record_id);
                                }
                            }
                            counts.record(action);
                        }
                        Err(err) if is_row_integrity_error(&err) => {
                            quarantine(&mut tx, ctx, row, &row_error_message(&err)).await?;
                            counts.record(RowAction::Error);
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }

        tx.commit().await?;
        Ok((counts, matches))
    }

    /// Match this chunk's identifying values against existing records.
    async fn lookup_matches(
        &self,
        ctx: &RunContext,
        rows: &[SourceRow],
    ) -> Result<HashMap<String, RecordId>, EngineError> {
        let Some((field, column)) = &ctx.active_matcher else {
            return Ok(HashMap::new());
        };

        let mut distinct: HashSet<String> = HashSet::new();
        for row in rows {
            let value = row.cell(*column).trim().to_lowercase();
            if !value.is_empty() {
                distinct.insert(value);
            }
        }
        if distinct.is_empty() {
            return Ok(HashMap::new());
        }

        let values: Vec<String> = distinct.into_iter().collect();
        let records = RecordRepo::find_by_field_values(
            &self.pool,
            ctx.tenant_id,
            &ctx.entity_type,
            field,
            &values,
        )
        .await?;

        let mut matched = HashMap::new();
        // Oldest record claims its value first.
        for record in records {
            let Some(value) = record.data.get(field).and_then(|v| v.as_str()) else {
                continue;
            };
            matched
                .entry(value.trim().to_lowercase())
                .or_insert(record.id);
        }
        Ok(matched)
    }

    async fn build_context(&self, session: &ImportSession) -> Result<RunContext, EngineError> {
        let mappings = session
            .column_mappings
            .as_ref()
            .map(|m| m.0.clone())
            .ok_or_else(|| EngineError::InvalidState {
                status: session.status.clone(),
                needed: "column mappings have not been saved",
            })?;
        let entity = self
            .fields
            .entity_fields(session.tenant_id, &session.entity_type)
            .await?;
        let options = session.options.0.clone();
        Ok(RunContext {
            tenant_id: session.tenant_id,
            session_id: session.id,
            created_by: session.created_by,
            entity_type: session.entity_type.clone(),
            headers: session.headers.0.clone(),
            mapped_indexes: mapped_column_indexes(&mappings),
            active_matcher: find_active_matcher(&entity.profile, &mappings),
            chunk_size: options.effective_chunk_size(),
            options,
            entity,
            mappings,
        })
    }
}

// ---------------------------------------------------------------------------
// Row planning
// ---------------------------------------------------------------------------

/// First profile matcher with a mapped column, in priority order.
fn find_active_matcher(
    profile: &ImporterProfile,
    mappings: &[ColumnMapping],
) -> Option<(String, usize)> {
    for matcher in &profile.matchable_fields {
        let mapped = mappings.iter().find(
            |m| matches!(&m.target, MappingTarget::Field { code } if code == matcher),
        );
        if let Some(mapping) = mapped {
            return Some((matcher.clone(), mapping.source_index));
        }
    }
    None
}

/// Classify one row. Pure: all lookups were resolved beforehand.
fn plan_row(
    ctx: &RunContext,
    row: &SourceRow,
    resolved: &ResolvedLinks,
    matches: &HashMap<String, RecordId>,
) -> RowPlan {
    if is_blank_row(&row.cells, &ctx.mapped_indexes) {
        return RowPlan::Skip;
    }

    if ctx.entity.profile.requires_unique_identifier && ctx.active_matcher.is_none() {
        return RowPlan::Error {
            message: "no identifying column is mapped".to_string(),
        };
    }

    let mut data = Map::new();
    for mapping in &ctx.mappings {
        let code = match &mapping.target {
            MappingTarget::Field { code } | MappingTarget::CustomField { code } => code,
            _ => continue,
        };
        let Some(field) = ctx.entity.field(code) else {
            return RowPlan::Error {
                message: format!("'{code}' is no longer an importable field"),
            };
        };
        let raw = row.cell(mapping.source_index);
        match convert_value(field, &ctx.options, Value::String(raw.to_string())) {
            Ok(Value::Null) => {
                if field.required {
                    return RowPlan::Error {
                        message: format!("{} is required", field.label),
                    };
                }
                // Blank optional cells write nothing, so updates never
                // blank out values the file does not carry.
            }
            Ok(value) => {
                data.insert(field.code.clone(), value);
            }
            Err(message) => {
                return RowPlan::Error {
                    message: format!("{}: {message}", field.label),
                };
            }
        }
    }

    let mut edges = Vec::new();
    for mapping in &ctx.mappings {
        let MappingTarget::EntityLink { key } = &mapping.target else {
            continue;
        };
        let Some(link) = ctx.entity.profile.link(key) else {
            continue;
        };
        let raw = row.cell(mapping.source_index).trim();
        if raw.is_empty() {
            if link.required {
                return RowPlan::Error {
                    message: format!("{} is required", link.label),
                };
            }
            continue;
        }
        match resolved.get(key, raw) {
            Some(target) => match &link.storage {
                StorageStrategy::ForeignKey { attribute } => {
                    data.insert(attribute.clone(), Value::String(target.id().to_string()));
                }
                StorageStrategy::CustomFieldValue { code } => {
                    data.insert(code.clone(), Value::String(target.id().to_string()));
                }
                StorageStrategy::MorphToMany { relation } => {
                    let target_type = match target {
                        LinkTarget::Record(_) => link.target_entity_type.clone(),
                        LinkTarget::TeamMember(_) => TEAM_MEMBER_TYPE.to_string(),
                    };
                    edges.push(PendingEdge {
                        relation: relation.clone(),
                        target_type,
                        target_id: target.id(),
                    });
                }
            },
            None if link.required => {
                return RowPlan::Error {
                    message: format!("could not find {} matching '{raw}'", link.label),
                };
            }
            // Optional links with no match are left unset.
            None => {}
        }
    }

    let matcher_value = ctx.active_matcher.as_ref().and_then(|(_, column)| {
        let value = row.cell(*column).trim().to_lowercase();
        (!value.is_empty()).then_some(value)
    });
    let matched = matcher_value.as_ref().and_then(|v| matches.get(v).copied());

    if matched.is_none() {
        // Creates need every required field present; updates leave
        // untouched fields as they are.
        for field in &ctx.entity.fields {
            if field.required && !data.contains_key(&field.code) {
                return RowPlan::Error {
                    message: format!("{} is required", field.label),
                };
            }
        }
    }

    RowPlan::Write(WritePlan {
        matched,
        matcher_value,
        data,
        edges,
    })
}

// ---------------------------------------------------------------------------
// Write helpers
// ---------------------------------------------------------------------------

/// Apply one write plan inside its row savepoint. Consumes the
/// savepoint: committed on success, rolled back on error.
async fn apply_write(
    mut sp: Transaction<'_, Postgres>,
    ctx: &RunContext,
    write: &WritePlan,
) -> Result<RecordId, sqlx::Error> {
    let record_id = match write.matched {
        Some(id) if write.data.is_empty() => id,
        Some(id) => {
            RecordRepo::merge_data_tx(&mut sp, id, &Value::Object(write.data.clone()))
                .await?
                .id
        }
        None => {
            RecordRepo::create_tx(
                &mut sp,
                &CreateRecord {
                    tenant_id: ctx.tenant_id,
                    entity_type: ctx.entity_type.clone(),
                    data: Value::Object(write.data.clone()),
                    created_by: ctx.created_by,
                },
            )
            .await?
            .id
        }
    };

    for edge in &write.edges {
        RecordLinkRepo::link_tx(
            &mut sp,
            &CreateRecordLink {
                tenant_id: ctx.tenant_id,
                record_id,
                relation: edge.relation.clone(),
                target_type: edge.target_type.clone(),
                target_id: edge.target_id,
            },
        )
        .await?;
    }

    sp.commit().await?;
    Ok(record_id)
}

/// Quarantine one row with its original cell values, keyed by header.
async fn quarantine(
    tx: &mut Transaction<'_, Postgres>,
    ctx: &RunContext,
    row: &SourceRow,
    message: &str,
) -> Result<(), sqlx::Error> {
    let mut original = Map::new();
    for (index, header) in ctx.headers.iter().enumerate() {
        original.insert(header.clone(), Value::String(row.cell(index).to_string()));
    }
    FailedImportRowRepo::create_tx(
        tx,
        &CreateFailedImportRow {
            tenant_id: ctx.tenant_id,
            session_id: ctx.session_id,
            entity_type: ctx.entity_type.clone(),
            row_number: row.row_number,
            row_data: Value::Object(original),
            error_message: message.to_string(),
        },
    )
    .await
    .map(|_| ())
}

/// Read the next chunk on the blocking pool, handing the reader back.
async fn read_chunk(
    mut reader: RowReader,
    max: usize,
) -> Result<(RowReader, Vec<SourceRow>), EngineError> {
    let (reader, rows) = tokio::task::spawn_blocking(move || {
        let rows = reader.next_chunk(max);
        (reader, rows)
    })
    .await?;
    Ok((reader, rows?))
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Integrity violations (SQLSTATE class 23) implicate only the row that
/// carried the value; everything else is infrastructure and aborts the
/// run. A vanished merge target counts as a row problem too.
fn is_row_integrity_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::RowNotFound => true,
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| code.starts_with("23"))
            .unwrap_or(false),
        _ => false,
    }
}

/// Serialization failures (40001) and deadlocks (40P01) may succeed on
/// a clean retry of the same chunk.
fn is_retryable(err: &EngineError) -> bool {
    let EngineError::Db(sqlx::Error::Database(db)) = err else {
        return false;
    };
    matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
}

fn row_error_message(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::RowNotFound => "the matched record no longer exists".to_string(),
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::profiles;

    fn mapping(index: usize, header: &str, target: MappingTarget) -> ColumnMapping {
        ColumnMapping {
            source_index: index,
            source_header: header.to_string(),
            target,
        }
    }

    fn field_target(code: &str) -> MappingTarget {
        MappingTarget::Field {
            code: code.to_string(),
        }
    }

    fn row(number: i64, cells: &[&str]) -> SourceRow {
        SourceRow {
            row_number: number,
            cells: cells.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Company context with name + domain + owner-link columns.
    fn company_context() -> RunContext {
        let mappings = vec![
            mapping(0, "Name", field_target("name")),
            mapping(1, "Domain", field_target("domain")),
            mapping(
                2,
                "Owner",
                MappingTarget::EntityLink {
                    key: "account_owner".to_string(),
                },
            ),
            mapping(3, "Notes", MappingTarget::Ignored),
        ];
        let entity = EntityFields {
            fields: profiles::native_fields("company"),
            profile: profiles::company_profile(),
        };
        RunContext {
            tenant_id: TenantId::new_v4(),
            session_id: SessionId::new_v4(),
            created_by: None,
            entity_type: "company".to_string(),
            headers: vec![
                "Name".to_string(),
                "Domain".to_string(),
                "Owner".to_string(),
                "Notes".to_string(),
            ],
            mapped_indexes: mapped_column_indexes(&mappings),
            active_matcher: find_active_matcher(&entity.profile, &mappings),
            chunk_size: 100,
            options: ImportOptions::default(),
            entity,
            mappings,
        }
    }

    #[test]
    fn active_matcher_follows_profile_priority() {
        let ctx = company_context();
        // Domain outranks name even though name is mapped first.
        assert_eq!(ctx.active_matcher, Some(("domain".to_string(), 1)));

        let name_only = vec![mapping(0, "Name", field_target("name"))];
        let matcher = find_active_matcher(&profiles::company_profile(), &name_only);
        assert_eq!(matcher, Some(("name".to_string(), 0)));

        let unmapped = vec![mapping(0, "Notes", MappingTarget::Ignored)];
        assert_eq!(
            find_active_matcher(&profiles::company_profile(), &unmapped),
            None
        );
    }

    #[test]
    fn blank_rows_skip_even_with_unmapped_noise() {
        let ctx = company_context();
        let plan = plan_row(
            &ctx,
            &row(1, &["", "  ", "", "unmapped noise"]),
            &ResolvedLinks::default(),
            &HashMap::new(),
        );
        assert!(matches!(plan, RowPlan::Skip));
    }

    #[test]
    fn missing_identifier_column_fails_every_row() {
        let mut ctx = company_context();
        // Only a non-matchable column mapped: no identifier available.
        ctx.mappings = vec![mapping(0, "Industry", field_target("industry"))];
        ctx.mapped_indexes = mapped_column_indexes(&ctx.mappings);
        ctx.active_matcher = find_active_matcher(&ctx.entity.profile, &ctx.mappings);
        assert_eq!(ctx.active_matcher, None);

        // Blank rows still skip; content rows error.
        let blank = plan_row(&ctx, &row(1, &[""]), &ResolvedLinks::default(), &HashMap::new());
        assert!(matches!(blank, RowPlan::Skip));
        let plan = plan_row(
            &ctx,
            &row(2, &["Software"]),
            &ResolvedLinks::default(),
            &HashMap::new(),
        );
        let RowPlan::Error { message } = plan else {
            panic!("expected an error plan");
        };
        assert_eq!(message, "no identifying column is mapped");
    }

    #[test]
    fn conversion_errors_name_the_field_label() {
        let mut ctx = company_context();
        ctx.mappings
            .push(mapping(4, "Employees", field_target("employee_count")));
        ctx.mapped_indexes = mapped_column_indexes(&ctx.mappings);

        let plan = plan_row(
            &ctx,
            &row(1, &["Acme", "acme.com", "", "", "lots"]),
            &ResolvedLinks::default(),
            &HashMap::new(),
        );
        let RowPlan::Error { message } = plan else {
            panic!("expected an error plan");
        };
        assert!(message.starts_with("Employee count:"), "got: {message}");
        assert!(message.contains("'lots'"));
    }

    #[test]
    fn blank_required_field_is_an_error() {
        let ctx = company_context();
        let plan = plan_row(
            &ctx,
            &row(2, &["", "acme.com", "", ""]),
            &ResolvedLinks::default(),
            &HashMap::new(),
        );
        let RowPlan::Error { message } = plan else {
            panic!("expected an error plan");
        };
        assert_eq!(message, "Name is required");
    }

    #[test]
    fn unmapped_required_field_blocks_creates_but_not_updates() {
        let mut ctx = company_context();
        // Drop the name column entirely.
        ctx.mappings = vec![mapping(1, "Domain", field_target("domain"))];
        ctx.mapped_indexes = mapped_column_indexes(&ctx.mappings);
        ctx.active_matcher = find_active_matcher(&ctx.entity.profile, &ctx.mappings);

        let create = plan_row(
            &ctx,
            &row(1, &["", "acme.com"]),
            &ResolvedLinks::default(),
            &HashMap::new(),
        );
        let RowPlan::Error { message } = create else {
            panic!("expected an error plan");
        };
        assert_eq!(message, "Name is required");

        let existing = RecordId::new_v4();
        let matches = HashMap::from([("acme.com".to_string(), existing)]);
        let update = plan_row(&ctx, &row(1, &["", "acme.com"]), &ResolvedLinks::default(), &matches);
        let RowPlan::Write(write) = update else {
            panic!("expected a write plan");
        };
        assert_eq!(write.matched, Some(existing));
    }

    #[test]
    fn matcher_value_is_normalized_for_matching() {
        let ctx = company_context();
        let existing = RecordId::new_v4();
        let matches = HashMap::from([("acme.com".to_string(), existing)]);

        let plan = plan_row(
            &ctx,
            &row(1, &["Acme", "  ACME.COM  ", "", ""]),
            &ResolvedLinks::default(),
            &matches,
        );
        let RowPlan::Write(write) = plan else {
            panic!("expected a write plan");
        };
        assert_eq!(write.matched, Some(existing));
        assert_eq!(write.matcher_value.as_deref(), Some("acme.com"));
        // The stored value keeps the original casing.
        assert_eq!(write.data["domain"], Value::String("ACME.COM".to_string()));
    }

    #[test]
    fn morph_link_becomes_a_pending_edge() {
        let ctx = company_context();
        let owner = UserId::new_v4();
        let mut resolved = ResolvedLinks::default();
        resolved.insert("account_owner", "ada@example.com", LinkTarget::TeamMember(owner));

        let plan = plan_row(
            &ctx,
            &row(1, &["Acme", "acme.com", "Ada@Example.com", ""]),
            &resolved,
            &HashMap::new(),
        );
        let RowPlan::Write(write) = plan else {
            panic!("expected a write plan");
        };
        assert!(write.matched.is_none());
        assert_eq!(write.edges.len(), 1);
        assert_eq!(write.edges[0].relation, "owners");
        assert_eq!(write.edges[0].target_type, TEAM_MEMBER_TYPE);
        assert_eq!(write.edges[0].target_id, owner);
    }

    #[test]
    fn unresolved_optional_link_is_left_unset() {
        let ctx = company_context();
        let plan = plan_row(
            &ctx,
            &row(1, &["Acme", "acme.com", "nobody@example.com", ""]),
            &ResolvedLinks::default(),
            &HashMap::new(),
        );
        let RowPlan::Write(write) = plan else {
            panic!("expected a write plan");
        };
        assert!(write.edges.is_empty());
        assert!(!write.data.contains_key("account_owner"));
    }

    #[test]
    fn unresolved_required_link_is_an_error() {
        let mut ctx = company_context();
        ctx.entity.profile.links[0].required = true;

        let plan = plan_row(
            &ctx,
            &row(3, &["Acme", "acme.com", "nobody@example.com", ""]),
            &ResolvedLinks::default(),
            &HashMap::new(),
        );
        let RowPlan::Error { message } = plan else {
            panic!("expected an error plan");
        };
        assert_eq!(
            message,
            "could not find Account owner matching 'nobody@example.com'"
        );

        let blank = plan_row(
            &ctx,
            &row(4, &["Acme", "acme.com", "", ""]),
            &ResolvedLinks::default(),
            &HashMap::new(),
        );
        let RowPlan::Error { message } = blank else {
            panic!("expected an error plan");
        };
        assert_eq!(message, "Account owner is required");
    }

    #[test]
    fn foreign_key_link_lands_in_record_data() {
        let mappings = vec![
            mapping(0, "Email", field_target("email")),
            mapping(
                1,
                "Company",
                MappingTarget::EntityLink {
                    key: "company".to_string(),
                },
            ),
        ];
        let entity = EntityFields {
            fields: profiles::native_fields("person"),
            profile: profiles::person_profile(),
        };
        let ctx = RunContext {
            tenant_id: TenantId::new_v4(),
            session_id: SessionId::new_v4(),
            created_by: None,
            entity_type: "person".to_string(),
            headers: vec!["Email".to_string(), "Company".to_string()],
            mapped_indexes: mapped_column_indexes(&mappings),
            active_matcher: find_active_matcher(&entity.profile, &mappings),
            chunk_size: 100,
            options: ImportOptions::default(),
            entity,
            mappings,
        };

        let company = RecordId::new_v4();
        let mut resolved = ResolvedLinks::default();
        resolved.insert("company", "acme.com", LinkTarget::Record(company));

        let plan = plan_row(
            &ctx,
            &row(1, &["ada@example.com", "acme.com"]),
            &resolved,
            &HashMap::new(),
        );
        let RowPlan::Write(write) = plan else {
            panic!("expected a write plan");
        };
        assert_eq!(
            write.data["company_id"],
            Value::String(company.to_string())
        );
        assert!(write.edges.is_empty());
        // Email converted lowercased by the email rule.
        assert_eq!(write.data["email"], Value::String("ada@example.com".to_string()));
    }

    #[test]
    fn integrity_and_retryable_classification() {
        assert!(is_row_integrity_error(&sqlx::Error::RowNotFound));
        assert!(!is_row_integrity_error(&sqlx::Error::PoolTimedOut));
        assert!(!is_retryable(&EngineError::Db(sqlx::Error::PoolTimedOut)));
    }
}
