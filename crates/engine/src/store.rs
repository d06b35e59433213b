//! Session store: upload intake, spool management, and the lifecycle
//! calls the HTTP layer delegates to.
//!
//! Each session owns one spool directory under the configured root,
//! named by its id. The directory holds the original upload plus the
//! canonical `rows.csv` that analysis, preview, and commit all stream.
//! The id is minted before the database row so the directory can exist
//! first; the cleanup sweep reclaims directories whose row never
//! materialized.

use std::path::PathBuf;
use std::sync::Arc;

use meridian_core::mapping::ColumnMapping;
use meridian_core::profiles;
use meridian_core::session::{ImportOptions, SessionStatus};
use meridian_core::types::{SessionId, TenantId, UserId};
use meridian_db::models::import_session::{CreateImportSession, ImportSession};
use meridian_db::repositories::ImportSessionRepo;
use meridian_db::DbPool;
use meridian_events::{EventBus, ImportEvent};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::spreadsheet::{self, SourceFormat, ROWS_FILE};

/// Coordinates session rows and their on-disk spool directories.
#[derive(Clone)]
pub struct SessionStore {
    pool: DbPool,
    spool_root: PathBuf,
    bus: Arc<EventBus>,
}

impl SessionStore {
    pub fn new(pool: DbPool, spool_root: impl Into<PathBuf>, bus: Arc<EventBus>) -> Self {
        Self {
            pool,
            spool_root: spool_root.into(),
            bus,
        }
    }

    /// The session's spool directory.
    pub fn spool_dir(&self, id: SessionId) -> PathBuf {
        self.spool_root.join(id.to_string())
    }

    /// Path of the session's canonical row file.
    pub fn rows_path(&self, id: SessionId) -> PathBuf {
        self.spool_dir(id).join(ROWS_FILE)
    }

    /// Accept an upload: spool the bytes, parse the spreadsheet, and
    /// return the session in 'mapping' status.
    ///
    /// A file that cannot be parsed leaves a 'failed' session behind so
    /// the client can show what went wrong.
    pub async fn create_from_upload(
        &self,
        tenant_id: TenantId,
        created_by: Option<UserId>,
        entity_type: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ImportSession, EngineError> {
        if profiles::profile_for(entity_type).is_none() {
            return Err(EngineError::UnknownEntityType(entity_type.to_string()));
        }
        let format = SourceFormat::from_file_name(file_name)
            .ok_or_else(|| EngineError::UnsupportedFormat(file_name.to_string()))?;

        let id = Uuid::now_v7();
        let dir = self.spool_dir(id);
        tokio::fs::create_dir_all(&dir).await?;
        let original = dir.join(format!("original.{}", format.extension()));
        tokio::fs::write(&original, &bytes).await?;

        ImportSessionRepo::create(
            &self.pool,
            &CreateImportSession {
                id,
                tenant_id,
                created_by,
                entity_type: entity_type.to_string(),
                source_name: file_name.to_string(),
            },
        )
        .await?;

        let rows = dir.join(ROWS_FILE);
        let parsed =
            tokio::task::spawn_blocking(move || spreadsheet::normalize_to_csv(&original, format, &rows))
                .await?;
        let shape = match parsed {
            Ok(shape) => shape,
            Err(err) => {
                warn!(session_id = %id, error = %err, "uploaded file failed to parse");
                ImportSessionRepo::finish(&self.pool, id, SessionStatus::Failed, Some(&err.to_string()))
                    .await?;
                return Err(err);
            }
        };

        let session = ImportSessionRepo::mark_parsed(
            &self.pool,
            id,
            shape.row_count,
            shape.headers.len() as i32,
            &shape.headers,
        )
        .await?
        .ok_or(EngineError::SessionNotFound(id))?;

        info!(
            session_id = %id,
            entity_type,
            rows = shape.row_count,
            columns = shape.headers.len(),
            "import session created"
        );
        self.bus.publish(ImportEvent::SessionCreated {
            session_id: id,
            tenant_id,
            entity_type: entity_type.to_string(),
            row_count: shape.row_count,
        });
        Ok(session)
    }

    /// Fetch a session, tenant-scoped.
    pub async fn get(&self, tenant_id: TenantId, id: SessionId) -> Result<ImportSession, EngineError> {
        ImportSessionRepo::find_for_tenant(&self.pool, tenant_id, id)
            .await?
            .ok_or(EngineError::SessionNotFound(id))
    }

    /// A tenant's sessions, newest first.
    pub async fn list(&self, tenant_id: TenantId) -> Result<Vec<ImportSession>, EngineError> {
        Ok(ImportSessionRepo::list_for_tenant(&self.pool, tenant_id).await?)
    }

    /// Save the user's column mappings and interpretation options.
    pub async fn save_mappings(
        &self,
        tenant_id: TenantId,
        id: SessionId,
        mappings: &[ColumnMapping],
        options: &ImportOptions,
    ) -> Result<ImportSession, EngineError> {
        match ImportSessionRepo::set_mappings(&self.pool, tenant_id, id, mappings, options).await? {
            Some(session) => Ok(session),
            None => {
                // Not updated: either the session is unknown or a run
                // has frozen the mappings. Tell the caller which.
                let session = self.get(tenant_id, id).await?;
                Err(EngineError::InvalidState {
                    status: session.status,
                    needed: "mappings can only change before a run starts",
                })
            }
        }
    }

    /// Keep-alive ping from an open wizard.
    pub async fn touch(&self, tenant_id: TenantId, id: SessionId) -> Result<(), EngineError> {
        if ImportSessionRepo::touch_heartbeat(&self.pool, tenant_id, id).await? {
            Ok(())
        } else {
            Err(EngineError::SessionNotFound(id))
        }
    }

    /// Try to claim the session for a commit run.
    ///
    /// `Ok(None)` means another caller holds or already ran the import;
    /// the claim itself is serialized inside the repository.
    pub async fn try_begin_import(
        &self,
        tenant_id: TenantId,
        id: SessionId,
    ) -> Result<Option<ImportSession>, EngineError> {
        let session = self.get(tenant_id, id).await?;
        if session.column_mappings.is_none() {
            return Err(EngineError::InvalidState {
                status: session.status,
                needed: "column mappings have not been saved",
            });
        }
        if !ImportSessionRepo::try_begin_import(&self.pool, tenant_id, id).await? {
            return Ok(None);
        }
        self.get(tenant_id, id).await.map(Some)
    }

    /// Delete the session row and its spool directory. Returns false
    /// when no row existed (the spool is then left to the cleanup
    /// sweep, which verifies it really is orphaned).
    pub async fn destroy(&self, tenant_id: TenantId, id: SessionId) -> Result<bool, EngineError> {
        if !ImportSessionRepo::delete(&self.pool, tenant_id, id).await? {
            return Ok(false);
        }
        self.remove_spool(id).await?;
        info!(session_id = %id, "import session destroyed");
        self.bus.publish(ImportEvent::SessionDestroyed {
            session_id: id,
            tenant_id,
        });
        Ok(true)
    }

    async fn remove_spool(&self, id: SessionId) -> Result<(), EngineError> {
        match tokio::fs::remove_dir_all(self.spool_dir(id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
