//! Route definitions for the spreadsheet import wizard.
//!
//! Mounted at `/import`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{events, importer};
use crate::state::AppState;

/// Routes mounted at `/import`.
///
/// ```text
/// POST   /sessions                                -> upload (multipart)
/// GET    /sessions                                -> list_sessions
/// GET    /sessions/{id}                           -> get_session
/// DELETE /sessions/{id}                           -> destroy_session
/// GET    /sessions/{id}/mappings                  -> get_mappings
/// PUT    /sessions/{id}/mappings                  -> put_mappings
/// GET    /sessions/{id}/columns/{index}/analysis  -> column_analysis
/// POST   /sessions/{id}/heartbeat                 -> heartbeat
/// POST   /sessions/{id}/preview                   -> preview
/// POST   /sessions/{id}/commit                    -> commit
/// GET    /events                                  -> SSE event stream
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/sessions",
            post(importer::upload).get(importer::list_sessions),
        )
        .route(
            "/sessions/{id}",
            get(importer::get_session).delete(importer::destroy_session),
        )
        .route(
            "/sessions/{id}/mappings",
            get(importer::get_mappings).put(importer::put_mappings),
        )
        .route(
            "/sessions/{id}/columns/{index}/analysis",
            get(importer::column_analysis),
        )
        .route("/sessions/{id}/heartbeat", post(importer::heartbeat))
        .route("/sessions/{id}/preview", post(importer::preview))
        .route("/sessions/{id}/commit", post(importer::commit))
        .route("/events", get(events::stream))
}
