//! Pure reconciliation of v1 source metadata against a v2 target snapshot.
//!
//! Nothing in here performs I/O or fails. Every function takes read-only
//! snapshots and returns pairings or tagged outcomes that the migrator turns
//! into API calls.

pub mod authorization;
pub mod deletion;
pub mod duration;
pub mod retention;

use serde::Serialize;
use std::fmt;

/// Why an entity produced no operation.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// v1 administrators are not migrated.
    Administrator,
    /// The user holds no read or write grant.
    NoGrants,
    /// The target already satisfies the source entity.
    UpToDate,
    /// No matching target entity exists.
    NotFound,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Administrator => "administrator",
            SkipReason::NoGrants => "no grants",
            SkipReason::UpToDate => "up to date",
            SkipReason::NotFound => "not found",
        };
        f.write_str(text)
    }
}

/// Result of reconciling one entity: either skipped with a reason or an
/// operation for the migrator to execute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    Skipped(SkipReason),
    Planned(T),
}
