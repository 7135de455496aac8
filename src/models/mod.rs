//! Data models for both sides of the migration.
//!
//! `retention_policy` and `user` describe what is read from the v1 source,
//! `bucket` and `authorization` describe the v2 target. Everything derives
//! `serde` so it can be dumped to and restored from JSON files.

pub mod authorization;
pub mod bucket;
pub mod retention_policy;
pub mod snapshot;
pub mod user;
