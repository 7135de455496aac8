//! Represents a v1 user together with its database grants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A v1 user. Identity is `name`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct User {
    #[serde(alias = "user")]
    pub name: String,

    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,

    /// Databases the user may read from.
    #[serde(rename = "readDBs", default)]
    pub read_databases: BTreeSet<String>,

    /// Databases the user may write to.
    #[serde(rename = "writeDBs", default)]
    pub write_databases: BTreeSet<String>,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn admin(name: impl Into<String>) -> Self {
        Self {
            is_admin: true,
            ..Self::new(name)
        }
    }

    #[cfg(test)]
    pub fn with_read<I, S>(mut self, databases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_databases
            .extend(databases.into_iter().map(Into::into));
        self
    }

    #[cfg(test)]
    pub fn with_write<I, S>(mut self, databases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.write_databases
            .extend(databases.into_iter().map(Into::into));
        self
    }

    /// True when the user holds no read or write grant at all.
    pub fn has_no_grants(&self) -> bool {
        self.read_databases.is_empty() && self.write_databases.is_empty()
    }
}
