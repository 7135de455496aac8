//! Represents v2 legacy authorizations, which emulate v1 users and grants.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

/// Resource type every migrated permission refers to.
pub const BUCKETS_RESOURCE: &str = "buckets";

/// Status assigned to authorizations created by the migration.
pub const ACTIVE_STATUS: &str = "active";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Read => f.write_str("read"),
            Action::Write => f.write_str("write"),
        }
    }
}

/// The resource a permission applies to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PermissionResource {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub id: String,

    #[serde(rename = "orgID", default)]
    pub org_id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Permission {
    pub action: Action,
    pub resource: PermissionResource,
}

impl Permission {
    /// Permission to perform `action` on one bucket.
    pub fn bucket(action: Action, bucket_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            action,
            resource: PermissionResource {
                kind: BUCKETS_RESOURCE.into(),
                id: bucket_id.into(),
                org_id: org_id.into(),
            },
        }
    }
}

/// A legacy authorization in the v2 target. `token_name` equals the v1 user name.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LegacyAuthorization {
    pub id: String,

    #[serde(rename = "token")]
    pub token_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "orgID", default)]
    pub org_id: String,

    #[serde(default)]
    pub permissions: Vec<Permission>,

    #[serde(default)]
    pub status: String,
}

impl LegacyAuthorization {
    /// Ids of the buckets this authorization grants `action` on.
    ///
    /// Non-bucket resources are ignored and duplicates collapse, so two
    /// authorizations compare equal regardless of permission order.
    pub fn granted_buckets(&self, action: Action) -> BTreeSet<&str> {
        self.permissions
            .iter()
            .filter(|p| p.action == action && p.resource.kind == BUCKETS_RESOURCE)
            .map(|p| p.resource.id.as_str())
            .collect()
    }
}

/// Request body for creating a legacy authorization.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct NewLegacyAuthorization {
    #[serde(rename = "orgID")]
    pub org_id: String,

    #[serde(rename = "token")]
    pub token_name: String,

    pub description: String,

    pub permissions: Vec<Permission>,

    pub status: String,
}

impl NewLegacyAuthorization {
    pub fn for_user(user_name: &str, org_id: &str, permissions: Vec<Permission>) -> Self {
        Self {
            org_id: org_id.to_string(),
            token_name: user_name.to_string(),
            description: format!("migrated from v1 {user_name}"),
            permissions,
            status: ACTIVE_STATUS.into(),
        }
    }
}
