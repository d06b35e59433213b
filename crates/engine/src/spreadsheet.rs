//! Spreadsheet ingestion.
//!
//! Uploads arrive as CSV or XLSX. Both are normalized once, at upload
//! time, into a canonical `rows.csv` inside the session's spool
//! directory; every later step (analysis, preview, commit) streams that
//! one file with the same reader. XLSX quirks (typed cells, date
//! serials, trailing formatting) are dealt with here and nowhere else.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::EngineError;

/// File name of the canonical row file inside a session's spool
/// directory.
pub const ROWS_FILE: &str = "rows.csv";

// ---------------------------------------------------------------------------
// Source format
// ---------------------------------------------------------------------------

/// Upload format, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Xlsx,
}

impl SourceFormat {
    /// Detect the format from an uploaded file name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") | Some("txt") => Some(Self::Csv),
            Some("xlsx") | Some("xls") => Some(Self::Xlsx),
            _ => None,
        }
    }

    /// Extension used when spooling the original upload.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Shape of a normalized spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetShape {
    /// Header row, trimmed, in source column order.
    pub headers: Vec<String>,
    /// Number of data rows (the header row is not counted).
    pub row_count: i64,
}

/// One data row as streamed from the canonical file.
#[derive(Debug, Clone)]
pub struct SourceRow {
    /// 1-based data row ordinal; the header row is not counted.
    pub row_number: i64,
    pub cells: Vec<String>,
}

impl SourceRow {
    /// Cell at `index`, treating missing cells as blank.
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }
}

/// Normalize an upload into the canonical CSV at `dest`.
///
/// Synchronous; call from `spawn_blocking` on the server.
pub fn normalize_to_csv(
    source: &Path,
    format: SourceFormat,
    dest: &Path,
) -> Result<SheetShape, EngineError> {
    match format {
        SourceFormat::Csv => normalize_csv(source, dest),
        SourceFormat::Xlsx => normalize_xlsx(source, dest),
    }
}

fn normalize_csv(source: &Path, dest: &Path) -> Result<SheetShape, EngineError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(source)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(EngineError::Spreadsheet("missing header row".to_string()));
    }

    let mut writer = csv::Writer::from_path(dest)?;
    writer.write_record(&headers)?;
    let mut row_count = 0_i64;
    for record in reader.records() {
        let record = record?;
        writer.write_record(&record)?;
        row_count += 1;
    }
    writer.flush()?;
    Ok(SheetShape { headers, row_count })
}

fn normalize_xlsx(source: &Path, dest: &Path) -> Result<SheetShape, EngineError> {
    let mut workbook = open_workbook_auto(source)?;
    let sheet_names = workbook.sheet_names().to_vec();
    let first_sheet = sheet_names
        .first()
        .ok_or_else(|| EngineError::Spreadsheet("workbook has no sheets".to_string()))?;
    let range = workbook.worksheet_range(first_sheet)?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| EngineError::Spreadsheet("first sheet is empty".to_string()))?
        .iter()
        .map(cell_to_string)
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(EngineError::Spreadsheet("missing header row".to_string()));
    }

    let mut writer = csv::Writer::from_path(dest)?;
    writer.write_record(&headers)?;
    let mut row_count = 0_i64;
    for row in rows {
        let cells: Vec<String> = row.iter().map(cell_to_string).collect();
        writer.write_record(&cells)?;
        row_count += 1;
    }
    writer.flush()?;
    Ok(SheetShape { headers, row_count })
}

/// Render a typed XLSX cell the way the user saw it in the sheet. Date
/// cells become ISO dates, which the format-aware date parser accepts
/// under any configured format.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

/// Iterator over the canonical row file.
pub struct RowReader {
    inner: csv::StringRecordsIntoIter<std::fs::File>,
    next_row_number: i64,
}

impl RowReader {
    /// Open the canonical row file for streaming.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        Ok(Self {
            inner: reader.into_records(),
            next_row_number: 1,
        })
    }

    /// Read up to `max` rows. An empty result means end of file.
    pub fn next_chunk(&mut self, max: usize) -> Result<Vec<SourceRow>, EngineError> {
        let mut rows = Vec::with_capacity(max);
        while rows.len() < max {
            let Some(record) = self.inner.next() else {
                break;
            };
            let record = record?;
            rows.push(SourceRow {
                row_number: self.next_row_number,
                cells: record.iter().map(|c| c.to_string()).collect(),
            });
            self.next_row_number += 1;
        }
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_temp(content: &str, ext: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join(format!("upload.{ext}"))).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        dir
    }

    #[test]
    fn format_detection_by_extension() {
        assert_eq!(SourceFormat::from_file_name("a.csv"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_file_name("A.CSV"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_file_name("a.xlsx"), Some(SourceFormat::Xlsx));
        assert_eq!(SourceFormat::from_file_name("legacy.xls"), Some(SourceFormat::Xlsx));
        assert_eq!(SourceFormat::from_file_name("notes.pdf"), None);
        assert_eq!(SourceFormat::from_file_name("no_extension"), None);
    }

    #[test]
    fn csv_normalization_trims_headers_and_counts_rows() {
        let dir = write_temp(
            " Name , Email \nAda,ada@example.com\nBob,bob@example.com\n",
            "csv",
        );
        let dest = dir.path().join(ROWS_FILE);
        let shape =
            normalize_to_csv(&dir.path().join("upload.csv"), SourceFormat::Csv, &dest).unwrap();

        assert_eq!(shape.headers, vec!["Name", "Email"]);
        assert_eq!(shape.row_count, 2);

        let mut reader = RowReader::open(&dest).unwrap();
        let rows = reader.next_chunk(10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 1);
        assert_eq!(rows[0].cells, vec!["Ada", "ada@example.com"]);
    }

    #[test]
    fn quoted_and_ragged_rows_survive_normalization() {
        let dir = write_temp(
            "name,notes\n\"Ada, the first\",\"line one\nline two\"\nBob\n",
            "csv",
        );
        let dest = dir.path().join(ROWS_FILE);
        let shape =
            normalize_to_csv(&dir.path().join("upload.csv"), SourceFormat::Csv, &dest).unwrap();
        assert_eq!(shape.row_count, 2);

        let mut reader = RowReader::open(&dest).unwrap();
        let rows = reader.next_chunk(10).unwrap();
        assert_eq!(rows[0].cells[0], "Ada, the first");
        assert_eq!(rows[0].cells[1], "line one\nline two");
        // The short row reads back with its single cell; lookups past the
        // end are blank, not a panic.
        assert_eq!(rows[1].cell(0), "Bob");
        assert_eq!(rows[1].cell(1), "");
    }

    #[test]
    fn header_only_file_has_zero_rows() {
        let dir = write_temp("name,email\n", "csv");
        let dest = dir.path().join(ROWS_FILE);
        let shape =
            normalize_to_csv(&dir.path().join("upload.csv"), SourceFormat::Csv, &dest).unwrap();
        assert_eq!(shape.row_count, 0);
    }

    #[test]
    fn blank_header_row_is_rejected() {
        let dir = write_temp(",,\nAda,ada@example.com,x\n", "csv");
        let dest = dir.path().join(ROWS_FILE);
        let result = normalize_to_csv(&dir.path().join("upload.csv"), SourceFormat::Csv, &dest);
        assert!(matches!(result, Err(EngineError::Spreadsheet(_))));
    }

    #[test]
    fn chunked_reading_is_exhaustive_and_ordered() {
        let mut content = String::from("n\n");
        for i in 0..7 {
            content.push_str(&format!("{i}\n"));
        }
        let dir = write_temp(&content, "csv");
        let dest = dir.path().join(ROWS_FILE);
        normalize_to_csv(&dir.path().join("upload.csv"), SourceFormat::Csv, &dest).unwrap();

        let mut reader = RowReader::open(&dest).unwrap();
        let mut seen = Vec::new();
        loop {
            let chunk = reader.next_chunk(3).unwrap();
            if chunk.is_empty() {
                break;
            }
            assert!(chunk.len() <= 3);
            seen.extend(chunk.into_iter().map(|r| r.row_number));
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn typed_cells_render_like_the_sheet() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::String("  Ada  ".to_string())), "Ada");
        assert_eq!(cell_to_string(&Data::Float(42.0)), "42");
        assert_eq!(cell_to_string(&Data::Float(3.25)), "3.25");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::Bool(true)), "true");
    }
}
