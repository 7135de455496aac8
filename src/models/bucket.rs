//! Represents v2 buckets and the DBRP mappings that route v1 queries to them.

use crate::models::retention_policy::RetentionPolicy;
use serde::{Deserialize, Serialize};

/// A storage bucket in the v2 target.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
    /// Server-assigned identifier.
    pub id: String,

    /// Bucket name, unique within an organization.
    pub name: String,

    /// Owning organization.
    #[serde(rename = "orgID", default)]
    pub org_id: String,

    #[serde(rename = "retentionRules", default)]
    pub retention_rules: Vec<RetentionRule>,
}

/// A single retention rule attached to a bucket.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RetentionRule {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(rename = "everySeconds")]
    pub every_seconds: i64,
}

impl RetentionRule {
    pub fn expire(every_seconds: i64) -> Self {
        Self {
            kind: "expire".into(),
            every_seconds,
        }
    }
}

/// Request body for creating a bucket.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct NewBucket {
    pub name: String,

    #[serde(rename = "orgID")]
    pub org_id: String,

    pub description: String,

    #[serde(rename = "retentionRules")]
    pub retention_rules: Vec<RetentionRule>,
}

impl NewBucket {
    /// Build the bucket that a source retention policy migrates into.
    ///
    /// Only a positive duration yields an expiring rule; zero (and the
    /// negative values the duration grammar allows) means keep forever.
    pub fn for_policy(policy: &RetentionPolicy, org_id: &str) -> Self {
        let retention_rules = if policy.duration_seconds > 0 {
            vec![RetentionRule::expire(policy.duration_seconds)]
        } else {
            Vec::new()
        };
        Self {
            name: policy.bucket_name(),
            org_id: org_id.to_string(),
            description: format!(
                "migrated from v1 {}/{}",
                policy.database, policy.policy_name
            ),
            retention_rules,
        }
    }
}

/// A database/retention-policy mapping in the v2 target.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DbrpMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "bucketID")]
    pub bucket_id: String,

    pub database: String,

    #[serde(rename = "retention_policy")]
    pub retention_policy: String,

    #[serde(rename = "default", default)]
    pub is_default: bool,

    #[serde(rename = "orgID", default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

impl DbrpMapping {
    /// True when this mapping links `bucket_id` to the given source policy.
    ///
    /// All three of bucket id, database and policy name must agree.
    pub fn links(&self, bucket_id: &str, policy: &RetentionPolicy) -> bool {
        self.bucket_id == bucket_id
            && self.database == policy.database
            && self.retention_policy == policy.policy_name
    }
}

/// Request body for creating a DBRP mapping.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct NewDbrpMapping {
    #[serde(rename = "bucketID")]
    pub bucket_id: String,

    pub database: String,

    pub retention_policy: String,

    #[serde(rename = "default")]
    pub is_default: bool,

    #[serde(rename = "orgID")]
    pub org_id: String,
}

impl NewDbrpMapping {
    pub fn for_policy(bucket_id: &str, policy: &RetentionPolicy, org_id: &str) -> Self {
        Self {
            bucket_id: bucket_id.to_string(),
            database: policy.database.clone(),
            retention_policy: policy.policy_name.clone(),
            is_default: policy.is_default,
            org_id: org_id.to_string(),
        }
    }
}
