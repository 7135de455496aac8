//! Represents a retention policy read from the v1 source.

use serde::{Deserialize, Serialize};

/// A named data-retention rule scoped to one v1 database.
///
/// Identity is the `(database, policy_name)` pair. Values are read once from
/// the source and never mutated afterwards.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Database the policy belongs to.
    #[serde(rename = "db")]
    pub database: String,

    /// Policy name within the database (e.g. "autogen").
    #[serde(rename = "rp")]
    pub policy_name: String,

    /// Retention period in seconds, zero means infinite.
    #[serde(rename = "durationSeconds", default)]
    pub duration_seconds: i64,

    /// Whether this is the database's default policy.
    #[serde(rename = "default", alias = "isDefault", default)]
    pub is_default: bool,
}

impl RetentionPolicy {
    pub fn new(
        database: impl Into<String>,
        policy_name: impl Into<String>,
        duration_seconds: i64,
        is_default: bool,
    ) -> Self {
        Self {
            database: database.into(),
            policy_name: policy_name.into(),
            duration_seconds,
            is_default,
        }
    }

    /// Name of the v2 bucket this policy migrates into.
    pub fn bucket_name(&self) -> String {
        bucket_name(&self.database, &self.policy_name)
    }
}

/// Derive the bucket name for a `(database, policy)` pair.
///
/// This is the only join key between v1 retention policies and v2 buckets.
/// Creation and deletion both go through here.
pub fn bucket_name(database: &str, policy_name: &str) -> String {
    format!("{database}/{policy_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_name_embeds_database() {
        let a = RetentionPolicy::new("metrics", "autogen", 0, true);
        let b = RetentionPolicy::new("telegraf", "autogen", 0, true);
        assert_eq!(a.bucket_name(), "metrics/autogen");
        assert_ne!(a.bucket_name(), b.bucket_name());
    }

    #[test]
    fn deserializes_snapshot_shape() {
        let rp: RetentionPolicy = serde_json::from_str(
            r#"{"db":"metrics","rp":"weekly","durationSeconds":604800,"isDefault":true}"#,
        )
        .unwrap();
        assert_eq!(rp, RetentionPolicy::new("metrics", "weekly", 604_800, true));

        let json = serde_json::to_value(&rp).unwrap();
        assert_eq!(json["default"], true);
        assert_eq!(json["rp"], "weekly");
    }
}
