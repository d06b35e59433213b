//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` (or, for chunk-transactional writes, an open
//! `Transaction`) as the first argument.

pub mod failed_import_row_repo;
pub mod field_definition_repo;
pub mod import_session_repo;
pub mod record_link_repo;
pub mod record_repo;
pub mod team_member_repo;
pub mod tenant_repo;

pub use failed_import_row_repo::FailedImportRowRepo;
pub use field_definition_repo::FieldDefinitionRepo;
pub use import_session_repo::ImportSessionRepo;
pub use record_link_repo::RecordLinkRepo;
pub use record_repo::RecordRepo;
pub use team_member_repo::TeamMemberRepo;
pub use tenant_repo::TenantRepo;
