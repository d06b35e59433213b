//! Route definitions, one module per domain.

pub mod health;
pub mod importer;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /import/sessions                                upload (multipart POST), list (GET)
/// /import/sessions/{id}                           get, destroy (DELETE)
/// /import/sessions/{id}/mappings                  get suggestions/saved, save (PUT)
/// /import/sessions/{id}/columns/{index}/analysis  paged distinct values (GET)
/// /import/sessions/{id}/heartbeat                 keep-alive ping (POST)
/// /import/sessions/{id}/preview                   dry run (POST)
/// /import/sessions/{id}/commit                    start run (POST, 202)
/// /import/events                                  SSE progress stream (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/import", importer::router())
}
