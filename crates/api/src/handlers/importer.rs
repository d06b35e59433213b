//! Handlers for the spreadsheet import wizard.
//!
//! Provides endpoints for spreadsheet upload (multipart), mapping review,
//! column analysis, dry-run preview, commit, heartbeat, and session
//! retrieval/destruction. Handlers stay thin: lifecycle rules live in
//! [`meridian_engine::store::SessionStore`] and the pipeline itself in
//! [`meridian_engine::executor::ImportExecutor`].

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use meridian_core::analysis::{self, ValueIssue, ValuePage, DEFAULT_PER_PAGE};
use meridian_core::error::CoreError;
use meridian_core::fields::Field;
use meridian_core::links::EntityLink;
use meridian_core::mapping::{self, ColumnMapping, MappingTarget};
use meridian_core::outcome::ImportPreviewResult;
use meridian_core::session::ImportOptions;
use meridian_core::types::SessionId;
use meridian_db::models::import_session::ImportSession;
use meridian_engine::EngineError;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::extract::TenantCtx;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Typed response for the upload endpoint.
#[derive(Debug, Serialize)]
pub struct UploadReceipt {
    pub session_id: SessionId,
    pub status: String,
    pub row_count: i64,
    pub column_count: i32,
    pub headers: Vec<String>,
}

/// POST /api/v1/import/sessions
///
/// Accept a multipart upload (`file` + `entity_type`), spool and parse
/// the spreadsheet, and create an import session in 'mapping' status.
pub async fn upload(
    State(state): State<AppState>,
    ctx: TenantCtx,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<UploadReceipt>>)> {
    let mut entity_type: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("entity_type") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                entity_type = Some(value.trim().to_string());
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("unknown").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file = Some((file_name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let entity_type = entity_type.ok_or_else(|| {
        AppError::BadRequest("Missing 'entity_type' part in multipart upload".into())
    })?;
    let (file_name, bytes) = file
        .ok_or_else(|| AppError::BadRequest("Missing 'file' part in multipart upload".into()))?;

    let session = state
        .store
        .create_from_upload(ctx.tenant_id, ctx.user_id, &entity_type, &file_name, bytes)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UploadReceipt {
                session_id: session.id,
                status: session.status,
                row_count: session.row_count,
                column_count: session.column_count,
                headers: session.headers.0,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// GET /api/v1/import/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    ctx: TenantCtx,
) -> AppResult<Json<DataResponse<Vec<ImportSession>>>> {
    let sessions = state.store.list(ctx.tenant_id).await?;
    Ok(Json(DataResponse { data: sessions }))
}

/// GET /api/v1/import/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    ctx: TenantCtx,
    Path(id): Path<SessionId>,
) -> AppResult<Json<DataResponse<ImportSession>>> {
    let session = state.store.get(ctx.tenant_id, id).await?;
    Ok(Json(DataResponse { data: session }))
}

/// DELETE /api/v1/import/sessions/{id}
///
/// Destroy the session and its spool directory. A running commit
/// notices the missing row between chunks and stops; chunks already
/// committed stay committed.
pub async fn destroy_session(
    State(state): State<AppState>,
    ctx: TenantCtx,
    Path(id): Path<SessionId>,
) -> AppResult<StatusCode> {
    if !state.store.destroy(ctx.tenant_id, id).await? {
        return Err(EngineError::SessionNotFound(id).into());
    }
    state.analyzer.invalidate_session(id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/import/sessions/{id}/heartbeat
///
/// Keep-alive ping from an open wizard; spares the session from the
/// cleanup sweep.
pub async fn heartbeat(
    State(state): State<AppState>,
    ctx: TenantCtx,
    Path(id): Path<SessionId>,
) -> AppResult<StatusCode> {
    state.store.touch(ctx.tenant_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Mappings
// ---------------------------------------------------------------------------

/// Current mapping state of a session plus the catalog the review
/// screen renders choices from.
#[derive(Debug, Serialize)]
pub struct MappingSheet {
    /// False when `mappings` are fresh suggestions, not yet saved.
    pub saved: bool,
    pub mappings: Vec<ColumnMapping>,
    pub options: ImportOptions,
    /// Importable fields of the session's entity type, custom included.
    pub fields: Vec<Field>,
    /// Configured entity links, custom link fields included.
    pub links: Vec<EntityLink>,
}

/// GET /api/v1/import/sessions/{id}/mappings
///
/// Returns the saved mappings, or auto-suggestions when none were saved
/// yet.
pub async fn get_mappings(
    State(state): State<AppState>,
    ctx: TenantCtx,
    Path(id): Path<SessionId>,
) -> AppResult<Json<DataResponse<MappingSheet>>> {
    let session = state.store.get(ctx.tenant_id, id).await?;
    let entity = state
        .fields
        .entity_fields(ctx.tenant_id, &session.entity_type)
        .await?;

    let (saved, mappings) = match session.column_mappings {
        Some(saved_mappings) => (true, saved_mappings.0),
        None => (
            false,
            mapping::suggest_mappings(&session.headers.0, &entity.fields, &entity.profile.links),
        ),
    };

    Ok(Json(DataResponse {
        data: MappingSheet {
            saved,
            mappings,
            options: session.options.0,
            fields: entity.fields,
            links: entity.profile.links,
        },
    }))
}

/// Request body for saving mappings.
#[derive(Debug, Deserialize)]
pub struct SaveMappingsRequest {
    pub mappings: Vec<ColumnMapping>,
    #[serde(default)]
    pub options: ImportOptions,
}

/// PUT /api/v1/import/sessions/{id}/mappings
///
/// Validate and save the submitted mapping set. Repeatable until a
/// commit run freezes the session.
pub async fn put_mappings(
    State(state): State<AppState>,
    ctx: TenantCtx,
    Path(id): Path<SessionId>,
    Json(body): Json<SaveMappingsRequest>,
) -> AppResult<Json<DataResponse<ImportSession>>> {
    let session = state.store.get(ctx.tenant_id, id).await?;
    let entity = state
        .fields
        .entity_fields(ctx.tenant_id, &session.entity_type)
        .await?;

    let normalized = mapping::normalize_mappings(
        &body.mappings,
        &session.headers.0,
        &entity.fields,
        &entity.profile.links,
    )
    .map_err(CoreError::Validation)?;

    let updated = state
        .store
        .save_mappings(ctx.tenant_id, id, &normalized, &body.options)
        .await?;
    Ok(Json(DataResponse { data: updated }))
}

// ---------------------------------------------------------------------------
// Column analysis
// ---------------------------------------------------------------------------

/// Query parameters for the column analysis endpoint.
#[derive(Debug, Deserialize)]
pub struct AnalysisParams {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub search: Option<String>,
}

/// One column's analysis with a page of its distinct values.
#[derive(Debug, Serialize)]
pub struct ColumnAnalysisPage {
    pub column_index: usize,
    pub blank_count: i64,
    /// Cells scanned, blanks included.
    pub total_values: i64,
    /// Distinct problematic values under the current mapping target.
    pub issues: Vec<ValueIssue>,
    pub values: ValuePage,
}

/// GET /api/v1/import/sessions/{id}/columns/{index}/analysis
///
/// Analyze one column under its current mapping target. The analysis is
/// cached per (session, mapping, options); paging and searching reuse
/// the cached histogram.
pub async fn column_analysis(
    State(state): State<AppState>,
    ctx: TenantCtx,
    Path((id, index)): Path<(SessionId, usize)>,
    Query(params): Query<AnalysisParams>,
) -> AppResult<Json<DataResponse<ColumnAnalysisPage>>> {
    let session = state.store.get(ctx.tenant_id, id).await?;
    if index >= session.column_count as usize {
        return Err(CoreError::Validation(format!(
            "column index {index} is out of range (file has {} columns)",
            session.column_count
        ))
        .into());
    }

    let target = session
        .column_mappings
        .as_ref()
        .and_then(|m| m.0.iter().find(|c| c.source_index == index))
        .map(|c| c.target.clone())
        .unwrap_or(MappingTarget::Ignored);

    // Only field targets validate values; link columns and unmapped
    // columns get a plain histogram.
    let field = match &target {
        MappingTarget::Field { code } | MappingTarget::CustomField { code } => {
            let entity = state
                .fields
                .entity_fields(ctx.tenant_id, &session.entity_type)
                .await?;
            entity.field(code).cloned()
        }
        _ => None,
    };

    let analysis = state
        .analyzer
        .analyze(
            id,
            &state.store.rows_path(id),
            index,
            field.as_ref(),
            &target,
            &session.options.0,
        )
        .await?;

    let values = analysis::paginate_values(
        &analysis,
        params.page.unwrap_or(1),
        params.per_page.unwrap_or(DEFAULT_PER_PAGE),
        params.search.as_deref(),
    );

    Ok(Json(DataResponse {
        data: ColumnAnalysisPage {
            column_index: index,
            blank_count: analysis.blank_count,
            total_values: analysis.total_values,
            issues: analysis.issues.clone(),
            values,
        },
    }))
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// POST /api/v1/import/sessions/{id}/preview
///
/// Dry run: classify every row without writing anything. Uses the same
/// resolution and validation path as the commit.
pub async fn preview(
    State(state): State<AppState>,
    ctx: TenantCtx,
    Path(id): Path<SessionId>,
) -> AppResult<Json<DataResponse<ImportPreviewResult>>> {
    let session = state.store.get(ctx.tenant_id, id).await?;
    if !session.status().is_some_and(|s| s.can_begin_import()) {
        return Err(EngineError::InvalidState {
            status: session.status.clone(),
            needed: "a preview runs before the import is started",
        }
        .into());
    }

    let result = state
        .executor
        .preview(&session, &state.store.rows_path(id))
        .await?;
    Ok(Json(DataResponse { data: result }))
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// Typed response for the commit endpoint.
#[derive(Debug, Serialize)]
pub struct CommitReceipt {
    /// False when another caller already started (or finished) the run.
    pub started: bool,
}

/// POST /api/v1/import/sessions/{id}/commit
///
/// Claim the session and spawn the commit run in the background.
/// Progress streams over `GET /import/events`; terminal counts land on
/// the session resource.
pub async fn commit(
    State(state): State<AppState>,
    ctx: TenantCtx,
    Path(id): Path<SessionId>,
) -> AppResult<(StatusCode, Json<DataResponse<CommitReceipt>>)> {
    let Some(session) = state.store.try_begin_import(ctx.tenant_id, id).await? else {
        return Ok((
            StatusCode::ACCEPTED,
            Json(DataResponse {
                data: CommitReceipt { started: false },
            }),
        ));
    };

    let executor = state.executor.clone();
    let rows_path = state.store.rows_path(id);
    let cancel = state.commit_cancel.child_token();
    state.commits.spawn(async move {
        if let Err(err) = executor.run_commit(session, rows_path, cancel).await {
            tracing::error!(session_id = %id, error = %err, "commit run could not record its outcome");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: CommitReceipt { started: true },
        }),
    ))
}
