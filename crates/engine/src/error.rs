//! Engine error type.

use meridian_core::types::SessionId;

/// Errors produced by the import engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Import session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Session is '{status}': {needed}")]
    InvalidState {
        status: String,
        needed: &'static str,
    },

    #[error("Unsupported entity type: '{0}'")]
    UnknownEntityType(String),

    #[error("Unsupported file type: '{0}' (expected .csv, .xlsx or .xls)")]
    UnsupportedFormat(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Spreadsheet could not be read: {0}")]
    Spreadsheet(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
