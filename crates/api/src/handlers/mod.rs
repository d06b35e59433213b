//! HTTP handler functions, grouped by domain.

pub mod events;
pub mod importer;
