//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`ImportEvent`]s.
//! It is designed to be shared via `Arc<EventBus>` across the application.

use meridian_core::outcome::OutcomeCounts;
use meridian_core::session::SessionStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ImportEvent
// ---------------------------------------------------------------------------

/// A lifecycle event of an import session.
///
/// Serialized with an `event` tag so SSE consumers can dispatch on the
/// event name without inspecting the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ImportEvent {
    /// A spreadsheet was uploaded and parsed into a new session.
    SessionCreated {
        session_id: Uuid,
        tenant_id: Uuid,
        entity_type: String,
        row_count: i64,
    },
    /// A commit run won the start race and is now processing chunks.
    CommitStarted {
        session_id: Uuid,
        tenant_id: Uuid,
        total_rows: i64,
    },
    /// Emitted after every committed chunk.
    CommitProgress {
        session_id: Uuid,
        tenant_id: Uuid,
        processed_rows: i64,
        successful_rows: i64,
        failed_rows: i64,
    },
    /// The run reached a terminal status; counts are final.
    CommitFinished {
        session_id: Uuid,
        tenant_id: Uuid,
        status: SessionStatus,
        counts: OutcomeCounts,
    },
    /// The session (row and spool directory) is gone.
    SessionDestroyed { session_id: Uuid, tenant_id: Uuid },
}

impl ImportEvent {
    /// Stable event name, also used as the SSE `event:` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionCreated { .. } => "session_created",
            Self::CommitStarted { .. } => "commit_started",
            Self::CommitProgress { .. } => "commit_progress",
            Self::CommitFinished { .. } => "commit_finished",
            Self::SessionDestroyed { .. } => "session_destroyed",
        }
    }

    /// The session this event belongs to.
    pub fn session_id(&self) -> Uuid {
        match self {
            Self::SessionCreated { session_id, .. }
            | Self::CommitStarted { session_id, .. }
            | Self::CommitProgress { session_id, .. }
            | Self::CommitFinished { session_id, .. }
            | Self::SessionDestroyed { session_id, .. } => *session_id,
        }
    }

    /// The tenant the session belongs to. SSE streams filter on this so
    /// one workspace never sees another's progress.
    pub fn tenant_id(&self) -> Uuid {
        match self {
            Self::SessionCreated { tenant_id, .. }
            | Self::CommitStarted { tenant_id, .. }
            | Self::CommitProgress { tenant_id, .. }
            | Self::CommitFinished { tenant_id, .. }
            | Self::SessionDestroyed { tenant_id, .. } => *tenant_id,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`ImportEvent`].
pub struct EventBus {
    sender: broadcast::Sender<ImportEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// progress is advisory, the session row remains the durable record.
    pub fn publish(&self, event: ImportEvent) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
