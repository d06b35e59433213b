//! Column analysis with per-session caching.
//!
//! One analysis is a streaming pass over the canonical row file. It is
//! cached under (session, fingerprint), so reopening the review screen
//! costs nothing, while changing the column's target or the session
//! options computes fresh. Destroying a session drops its entries.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use meridian_core::analysis::{self, ColumnAnalysis};
use meridian_core::fields::Field;
use meridian_core::mapping::MappingTarget;
use meridian_core::rules::{self, ValueCheck};
use meridian_core::session::ImportOptions;
use meridian_core::types::SessionId;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::EngineError;
use crate::spreadsheet::RowReader;

const READ_CHUNK: usize = 1024;

/// Caches one [`ColumnAnalysis`] per (session, fingerprint).
#[derive(Default)]
pub struct ColumnAnalyzer {
    cache: Mutex<HashMap<(SessionId, u64), Arc<ColumnAnalysis>>>,
}

impl ColumnAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze one column of a session's row file under its current
    /// mapping target and options. `field` is the target field when the
    /// column is mapped; unmapped columns get a histogram with no
    /// issues.
    pub async fn analyze(
        &self,
        session_id: SessionId,
        rows_path: &Path,
        column_index: usize,
        field: Option<&Field>,
        target: &MappingTarget,
        options: &ImportOptions,
    ) -> Result<Arc<ColumnAnalysis>, EngineError> {
        let fingerprint = analysis::mapping_fingerprint(column_index, target, options);
        let key = (session_id, fingerprint);
        if let Some(found) = self.cache.lock().await.get(&key) {
            return Ok(Arc::clone(found));
        }

        let path = rows_path.to_path_buf();
        let field = field.cloned();
        let options = options.clone();
        let built = tokio::task::spawn_blocking(move || {
            let column = collect_column(&path, column_index)?;
            let analysis =
                analysis::build_analysis(column_index, fingerprint, column, |raw| match &field {
                    Some(field) => {
                        rules::check_value(field, &options, &Value::String(raw.to_string()))
                    }
                    None => ValueCheck::Ok,
                });
            Ok::<_, EngineError>(Arc::new(analysis))
        })
        .await??;

        // Racing callers may both compute; the cache keeps whichever
        // insert lands last. The results are identical either way.
        self.cache.lock().await.insert(key, Arc::clone(&built));
        Ok(built)
    }

    /// Drop every cached analysis belonging to a session.
    pub async fn invalidate_session(&self, session_id: SessionId) {
        self.cache
            .lock()
            .await
            .retain(|(id, _), _| *id != session_id);
    }
}

/// Pull one column out of the row file. Cells missing from short rows
/// read as blank.
fn collect_column(path: &Path, column_index: usize) -> Result<Vec<String>, EngineError> {
    let mut reader = RowReader::open(path)?;
    let mut column = Vec::new();
    loop {
        let chunk = reader.next_chunk(READ_CHUNK)?;
        if chunk.is_empty() {
            break;
        }
        column.extend(
            chunk
                .into_iter()
                .map(|row| row.cell(column_index).to_string()),
        );
    }
    Ok(column)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
