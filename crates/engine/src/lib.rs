//! The import pipeline engine: everything between the HTTP surface and
//! the database.
//!
//! [`store::SessionStore`] owns session lifecycle and the on-disk spool,
//! [`analyzer::ColumnAnalyzer`] caches per-column value analyses,
//! [`resolver::LinkResolver`] batch-resolves entity references, and
//! [`executor::ImportExecutor`] runs dry-run previews and chunked,
//! transactional commits over the same classification path.

pub mod analyzer;
pub mod cleanup;
pub mod error;
pub mod executor;
pub mod fields;
pub mod resolver;
pub mod seed;
pub mod spreadsheet;
pub mod store;

pub use error::EngineError;
