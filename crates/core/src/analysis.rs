//! Per-column value analysis: a distinct-value histogram with advisory
//! issues, built in one streaming pass, and the pagination over it that
//! backs the mapping review screen.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::mapping::MappingTarget;
use crate::rules::{Severity, ValueCheck};
use crate::session::ImportOptions;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_PER_PAGE: usize = 50;
pub const MAX_PER_PAGE: usize = 500;

// ---------------------------------------------------------------------------
// Analysis result
// ---------------------------------------------------------------------------

/// One distinct problematic value found in a column.
///
/// Deduplicated: a value occurring 40 times yields one issue with
/// `row_count = 40`, not 40 issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueIssue {
    pub value: String,
    pub message: String,
    pub row_count: i64,
    pub severity: Severity,
}

/// The cached analysis of one column under one mapping.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnAnalysis {
    pub column_index: usize,
    /// Identifies the (mapping, options) the analysis was computed under;
    /// a cache entry with a different fingerprint is stale.
    pub fingerprint: u64,
    /// Distinct non-blank values and how often each occurs.
    pub unique_values: HashMap<String, i64>,
    pub issues: Vec<ValueIssue>,
    pub blank_count: i64,
    /// Total cells scanned, blanks included.
    pub total_values: i64,
}

/// Build the analysis for one column.
///
/// Streams `values` once to build the histogram, then runs `validate`
/// exactly once per *distinct* value, never once per row. Blank cells
/// are tallied separately and never validated.
pub fn build_analysis(
    column_index: usize,
    fingerprint: u64,
    values: impl IntoIterator<Item = String>,
    mut validate: impl FnMut(&str) -> ValueCheck,
) -> ColumnAnalysis {
    let mut unique_values: HashMap<String, i64> = HashMap::new();
    let mut blank_count = 0i64;
    let mut total_values = 0i64;

    for value in values {
        total_values += 1;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            blank_count += 1;
        } else {
            *unique_values.entry(trimmed.to_string()).or_insert(0) += 1;
        }
    }

    let mut issues: Vec<ValueIssue> = unique_values
        .iter()
        .filter_map(|(value, &count)| match validate(value) {
            ValueCheck::Ok => None,
            ValueCheck::Issue { message, severity } => Some(ValueIssue {
                value: value.clone(),
                message,
                row_count: count,
                severity,
            }),
        })
        .collect();
    issues.sort_by(|a, b| b.row_count.cmp(&a.row_count).then(a.value.cmp(&b.value)));

    ColumnAnalysis {
        column_index,
        fingerprint,
        unique_values,
        issues,
        blank_count,
        total_values,
    }
}

/// Fingerprint of the inputs an analysis depends on. A changed mapping
/// target or changed session options produces a different fingerprint,
/// which invalidates the cached analysis for that column.
pub fn mapping_fingerprint(
    column_index: usize,
    target: &MappingTarget,
    options: &ImportOptions,
) -> u64 {
    let mut hasher = DefaultHasher::new();
    column_index.hash(&mut hasher);
    target.hash(&mut hasher);
    options.hash(&mut hasher);
    hasher.finish()
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// One histogram entry in a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: i64,
}

/// A page of distinct values, most frequent first.
#[derive(Debug, Clone, Serialize)]
pub struct ValuePage {
    pub values: Vec<ValueCount>,
    /// Distinct values after the search filter (not just this page).
    pub total_values: i64,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

/// Page through a column's distinct values.
///
/// `search` filters case-insensitively on substrings. Page contents and
/// `total_pages` both derive from the same filtered, sorted list (count
/// descending, then value ascending), so they cannot disagree. `page` is
/// 1-based; `per_page` is clamped to `1..=MAX_PER_PAGE`.
pub fn paginate_values(
    analysis: &ColumnAnalysis,
    page: usize,
    per_page: usize,
    search: Option<&str>,
) -> ValuePage {
    let page = page.max(1);
    let per_page = per_page.clamp(1, MAX_PER_PAGE);

    let needle = search.map(str::to_lowercase).filter(|s| !s.is_empty());

    let mut filtered: Vec<ValueCount> = analysis
        .unique_values
        .iter()
        .filter(|(value, _)| match &needle {
            Some(n) => value.to_lowercase().contains(n),
            None => true,
        })
        .map(|(value, &count)| ValueCount {
            value: value.clone(),
            count,
        })
        .collect();
    filtered.sort_by(|a, b| b.count.cmp(&a.count).then(a.value.cmp(&b.value)));

    let total = filtered.len();
    let total_pages = total.div_ceil(per_page);
    let start = (page - 1).saturating_mul(per_page);
    let values = if start < total {
        filtered[start..(start + per_page).min(total)].to_vec()
    } else {
        Vec::new()
    };

    ValuePage {
        values,
        total_values: total as i64,
        page,
        per_page,
        total_pages,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
