//! I/O around the reconciliation core: source and target collaborators,
//! the orchestrator that applies plans, and file documents.

pub mod files;
pub mod memory_target;
pub mod migrator;
pub mod source;
pub mod target;
pub mod v1_client;
pub mod v2_client;
