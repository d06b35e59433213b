//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts

pub mod failed_import_row;
pub mod field_definition;
pub mod import_session;
pub mod record;
pub mod team_member;
pub mod tenant;
