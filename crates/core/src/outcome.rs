//! Row outcomes and run tallies shared by dry-run previews and commits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Sample rows kept per category in a preview.
pub const MAX_PREVIEW_SAMPLES: usize = 10;

/// Error entries kept in a preview.
pub const MAX_PREVIEW_ERRORS: usize = 50;

// ---------------------------------------------------------------------------
// Row action
// ---------------------------------------------------------------------------

/// What the import does (or would do) with one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowAction {
    Create,
    Update,
    Skip,
    Error,
}

impl RowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Skip => "skip",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "skip" => Some(Self::Skip),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub const ALL: &'static [&'static str] = &["create", "update", "skip", "error"];
}

impl std::fmt::Display for RowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// Tally of row actions for a run. Every processed row lands in exactly
/// one bucket, so the bucket sum always equals the processed row count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub create_count: i64,
    pub update_count: i64,
    pub skip_count: i64,
    pub error_count: i64,
}

impl OutcomeCounts {
    pub fn record(&mut self, action: RowAction) {
        match action {
            RowAction::Create => self.create_count += 1,
            RowAction::Update => self.update_count += 1,
            RowAction::Skip => self.skip_count += 1,
            RowAction::Error => self.error_count += 1,
        }
    }

    /// Fold another tally (e.g. one chunk's) into this one.
    pub fn absorb(&mut self, other: OutcomeCounts) {
        self.create_count += other.create_count;
        self.update_count += other.update_count;
        self.skip_count += other.skip_count;
        self.error_count += other.error_count;
    }

    pub fn total(&self) -> i64 {
        self.create_count + self.update_count + self.skip_count + self.error_count
    }

    /// Rows that produced a durable write.
    pub fn successful(&self) -> i64 {
        self.create_count + self.update_count
    }
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

/// A row shown as a sample in the preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowSample {
    /// 1-based data row number (header excluded).
    pub row_number: i64,
    /// Mapped values keyed by target code.
    pub data: Map<String, Value>,
}

/// One row-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: i64,
    pub message: String,
}

/// The ephemeral result of a dry run. Never persisted; counts only
/// become durable when a commit records them on the session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportPreviewResult {
    pub total_rows: i64,
    #[serde(flatten)]
    pub counts: OutcomeCounts,
    pub create_samples: Vec<RowSample>,
    pub update_samples: Vec<RowSample>,
    pub skip_samples: Vec<RowSample>,
    pub errors: Vec<RowError>,
}

impl ImportPreviewResult {
    /// Record one classified row, keeping bounded samples per category.
    pub fn record(&mut self, action: RowAction, row_number: i64, data: Map<String, Value>) {
        self.total_rows += 1;
        self.counts.record(action);
        let samples = match action {
            RowAction::Create => &mut self.create_samples,
            RowAction::Update => &mut self.update_samples,
            RowAction::Skip => &mut self.skip_samples,
            RowAction::Error => return,
        };
        if samples.len() < MAX_PREVIEW_SAMPLES {
            samples.push(RowSample { row_number, data });
        }
    }

    /// Record one row error (the row also counts via [`Self::record`]
    /// when classified as [`RowAction::Error`]).
    pub fn record_error(&mut self, row_number: i64, message: String) {
        if self.errors.len() < MAX_PREVIEW_ERRORS {
            self.errors.push(RowError { row_number, message });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trip() {
        for s in RowAction::ALL {
            let action = RowAction::from_str(s).unwrap();
            assert_eq!(action.as_str(), *s);
        }
        assert!(RowAction::from_str("merge").is_none());
    }

    #[test]
    fn counts_sum_to_total() {
        let mut counts = OutcomeCounts::default();
        for action in [
            RowAction::Create,
            RowAction::Create,
            RowAction::Update,
            RowAction::Skip,
            RowAction::Error,
        ] {
            counts.record(action);
        }
        assert_eq!(counts.total(), 5);
        assert_eq!(counts.successful(), 3);
        assert_eq!(counts.create_count, 2);
        assert_eq!(counts.error_count, 1);
    }

    #[test]
    fn absorbing_chunks_preserves_the_sum() {
        let mut total = OutcomeCounts {
            create_count: 2,
            update_count: 1,
            skip_count: 0,
            error_count: 1,
        };
        total.absorb(OutcomeCounts {
            create_count: 1,
            update_count: 0,
            skip_count: 3,
            error_count: 0,
        });
        assert_eq!(total.create_count, 3);
        assert_eq!(total.skip_count, 3);
        assert_eq!(total.total(), 8);
    }

    #[test]
    fn preview_samples_are_bounded() {
        let mut preview = ImportPreviewResult::default();
        for row in 0..(MAX_PREVIEW_SAMPLES as i64 + 20) {
            preview.record(RowAction::Create, row + 1, Map::new());
        }
        assert_eq!(preview.create_samples.len(), MAX_PREVIEW_SAMPLES);
        // Counting is unaffected by the sample bound.
        assert_eq!(preview.counts.create_count, MAX_PREVIEW_SAMPLES as i64 + 20);
        assert_eq!(preview.total_rows, preview.counts.total());
    }

    #[test]
    fn preview_errors_are_bounded() {
        let mut preview = ImportPreviewResult::default();
        for row in 0..(MAX_PREVIEW_ERRORS as i64 + 5) {
            preview.record(RowAction::Error, row + 1, Map::new());
            preview.record_error(row + 1, "boom".into());
        }
        assert_eq!(preview.errors.len(), MAX_PREVIEW_ERRORS);
        assert_eq!(preview.counts.error_count, MAX_PREVIEW_ERRORS as i64 + 5);
    }

    #[test]
    fn error_rows_produce_no_samples() {
        let mut preview = ImportPreviewResult::default();
        preview.record(RowAction::Error, 1, Map::new());
        assert!(preview.create_samples.is_empty());
        assert!(preview.update_samples.is_empty());
        assert!(preview.skip_samples.is_empty());
    }

    #[test]
    fn preview_serializes_counts_flattened() {
        let mut preview = ImportPreviewResult::default();
        preview.record(RowAction::Create, 1, Map::new());
        let json = serde_json::to_value(&preview).unwrap();
        assert_eq!(json["total_rows"], 1);
        assert_eq!(json["create_count"], 1);
        assert_eq!(json["error_count"], 0);
    }
}
