//! Server-Sent Events stream of import lifecycle events.
//!
//! Subscribes to the shared [`meridian_events::EventBus`] and forwards
//! the requesting tenant's events. The `event:` field carries the event
//! name, the `data:` field the JSON payload.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use meridian_core::types::SessionId;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::extract::TenantCtx;
use crate::state::AppState;

/// Query parameters for the event stream.
#[derive(Debug, Deserialize)]
pub struct EventStreamParams {
    /// Restrict the stream to one session.
    pub session: Option<SessionId>,
}

/// GET /api/v1/import/events
pub async fn stream(
    State(state): State<AppState>,
    ctx: TenantCtx,
    Query(params): Query<EventStreamParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(tenant_id = %ctx.tenant_id, "import event stream opened");

    let mut rx = state.bus.subscribe();
    let tenant_id = ctx.tenant_id;

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if event.tenant_id() != tenant_id {
                        continue;
                    }
                    if params.session.is_some_and(|wanted| event.session_id() != wanted) {
                        continue;
                    }
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            yield Ok(Event::default().event(event.event_type()).data(json));
                        }
                        Err(err) => warn!(error = %err, "failed to serialize import event"),
                    }
                }
                // A lagged receiver skipped events; the client still
                // sees the terminal counts on the session resource.
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "import event stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
