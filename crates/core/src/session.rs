//! Import session lifecycle: status machine, per-session options, and the
//! reclamation predicate used by the cleanup job.
//!
//! This module has zero external dependencies (no DB, no async, no I/O).

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::formats::{DateFormat, NumberFormat};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default number of rows written per commit transaction.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Upper bound on a configured chunk size.
pub const MAX_CHUNK_SIZE: usize = 1_000;

/// Abandoned-session age threshold: how old the uploaded blob must be
/// before a non-terminal session is even considered for reclamation.
pub const DEFAULT_SESSION_MAX_AGE_HOURS: i64 = 24;

/// Heartbeat staleness threshold. Shorter than the age threshold: the
/// browser pings while the wizard is open, so a fresh heartbeat vetoes
/// reclamation of an old upload.
pub const DEFAULT_HEARTBEAT_STALE_MINUTES: i64 = 30;

// ---------------------------------------------------------------------------
// Session status
// ---------------------------------------------------------------------------

/// Lifecycle state of an import session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Upload received, spreadsheet not yet parsed.
    Uploading,
    /// Parsed; the user is adjusting column mappings.
    Mapping,
    /// A dry-run preview has been produced.
    Reviewing,
    /// A commit run is in flight.
    Importing,
    /// Commit finished; final counts recorded.
    Completed,
    /// Commit aborted by an infrastructure error.
    Failed,
}

impl SessionStatus {
    /// Status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Mapping => "mapping",
            Self::Reviewing => "reviewing",
            Self::Importing => "importing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a status string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "uploading" => Some(Self::Uploading),
            "mapping" => Some(Self::Mapping),
            "reviewing" => Some(Self::Reviewing),
            "importing" => Some(Self::Importing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// All valid status values.
    pub const ALL: &'static [&'static str] = &[
        "uploading",
        "mapping",
        "reviewing",
        "importing",
        "completed",
        "failed",
    ];

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Only sessions in these states may begin a commit run.
    pub fn can_begin_import(&self) -> bool {
        matches!(self, Self::Mapping | Self::Reviewing)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Import options
// ---------------------------------------------------------------------------

/// Per-session interpretation settings chosen by the user at upload time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportOptions {
    #[serde(default)]
    pub date_format: DateFormat,
    #[serde(default)]
    pub number_format: NumberFormat,
    /// Rows per commit transaction. Clamped via [`ImportOptions::effective_chunk_size`].
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            date_format: DateFormat::default(),
            number_format: NumberFormat::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ImportOptions {
    /// Chunk size clamped to `1..=MAX_CHUNK_SIZE`.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, MAX_CHUNK_SIZE)
    }
}

// ---------------------------------------------------------------------------
// Reclamation predicate
// ---------------------------------------------------------------------------

/// Decide whether a *non-terminal* session is abandoned and may be
/// reclaimed.
///
/// Two independent signals must both agree:
///
/// 1. the uploaded blob is older than `max_age` (nothing new arrived), and
/// 2. the last heartbeat is older than `heartbeat_stale` (nobody has the
///    wizard open).
///
/// A session that never sent a heartbeat is treated as stale once the age
/// threshold alone is exceeded.
pub fn should_reclaim(
    blob_age: Duration,
    heartbeat_age: Option<Duration>,
    max_age: Duration,
    heartbeat_stale: Duration,
) -> bool {
    if blob_age < max_age {
        return false;
    }
    match heartbeat_age {
        Some(age) => age >= heartbeat_stale,
        None => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
