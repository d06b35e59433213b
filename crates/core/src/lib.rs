//! Meridian import pipeline: pure domain logic.
//!
//! Zero-I/O building blocks shared by the engine, API, and CLI crates:
//! value parsing under configurable formats, column-mapping suggestion,
//! per-column value analysis, entity-link configuration, importer
//! profiles, and import session lifecycle types.

pub mod analysis;
pub mod error;
pub mod fields;
pub mod formats;
pub mod links;
pub mod mapping;
pub mod outcome;
pub mod profiles;
pub mod rules;
pub mod session;
pub mod types;

pub use error::CoreError;
