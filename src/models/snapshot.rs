//! File documents produced and consumed around a migration run.

use crate::models::{retention_policy::RetentionPolicy, user::User};
use serde::{Deserialize, Serialize};

/// A captured copy of the v1 metadata, replayable without the source system.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceSnapshot {
    #[serde(default)]
    pub dbrps: Vec<RetentionPolicy>,

    #[serde(default)]
    pub users: Vec<User>,
}

/// One line of the generated users file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UsersFileEntry {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(rename = "authorizationId", default, skip_serializing_if = "Option::is_none")]
    pub authorization_id: Option<String>,
}
