//! Pairs v1 retention policies with existing v2 buckets and DBRP mappings.

use crate::{
    models::{
        bucket::{Bucket, DbrpMapping},
        retention_policy::RetentionPolicy,
    },
    reconcile::{Outcome, SkipReason},
};
use serde::Serialize;
use std::collections::HashMap;

/// One source retention policy and whatever already exists for it in the target.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicyPairing {
    pub bucket_name: String,

    #[serde(rename = "rp")]
    pub policy: RetentionPolicy,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<Bucket>,

    #[serde(rename = "dbrp", skip_serializing_if = "Option::is_none")]
    pub mapping: Option<DbrpMapping>,
}

/// What has to happen in the target for a pairing to be satisfied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BucketOperation {
    /// Create the bucket, then its mapping.
    CreateBucket,
    /// The bucket exists, only the mapping is missing.
    CreateMapping { bucket_id: String },
}

impl RetentionPolicyPairing {
    pub fn decision(&self) -> Outcome<BucketOperation> {
        match (&self.bucket, &self.mapping) {
            (None, _) => Outcome::Planned(BucketOperation::CreateBucket),
            (Some(bucket), None) => Outcome::Planned(BucketOperation::CreateMapping {
                bucket_id: bucket.id.clone(),
            }),
            (Some(_), Some(_)) => Outcome::Skipped(SkipReason::UpToDate),
        }
    }
}

/// Index target buckets by name. Later entries win on duplicate names.
pub fn index_buckets_by_name(buckets: &[Bucket]) -> HashMap<&str, &Bucket> {
    buckets.iter().map(|b| (b.name.as_str(), b)).collect()
}

/// Pair every source policy with its bucket (by derived name) and mapping.
///
/// Output order matches `policies`. A mapping is only looked up once the
/// bucket is known, and the first mapping with a matching triple wins.
pub fn pair_retention_policies(
    policies: &[RetentionPolicy],
    buckets: &[Bucket],
    mappings: &[DbrpMapping],
) -> Vec<RetentionPolicyPairing> {
    let by_name = index_buckets_by_name(buckets);

    policies
        .iter()
        .map(|policy| {
            let bucket_name = policy.bucket_name();
            let bucket = by_name.get(bucket_name.as_str()).copied();
            let mapping =
                bucket.and_then(|b| mappings.iter().find(|m| m.links(&b.id, policy)));
            RetentionPolicyPairing {
                bucket_name,
                policy: policy.clone(),
                bucket: bucket.cloned(),
                mapping: mapping.cloned(),
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn bucket(id: &str, name: &str) -> Bucket {
        Bucket {
            id: id.into(),
            name: name.into(),
            org_id: "org1".into(),
            retention_rules: Vec::new(),
        }
    }

    pub(crate) fn mapping(bucket_id: &str, db: &str, rp: &str) -> DbrpMapping {
        DbrpMapping {
            id: Some(format!("m-{bucket_id}")),
            bucket_id: bucket_id.into(),
            database: db.into(),
            retention_policy: rp.into(),
            is_default: false,
            org_id: Some("org1".into()),
        }
    }

    #[test]
    fn preserves_length_and_order() {
        let policies = vec![
            RetentionPolicy::new("z", "autogen", 0, true),
            RetentionPolicy::new("a", "autogen", 0, true),
            RetentionPolicy::new("m", "weekly", 604_800, false),
        ];
        let pairs = pair_retention_policies(&policies, &[], &[]);
        assert_eq!(pairs.len(), policies.len());
        let names: Vec<_> = pairs.iter().map(|p| p.bucket_name.as_str()).collect();
        assert_eq!(names, ["z/autogen", "a/autogen", "m/weekly"]);
        assert!(pairs.iter().all(|p| p.decision() == Outcome::Planned(BucketOperation::CreateBucket)));
    }

    #[test]
    fn existing_bucket_without_mapping_needs_mapping_only() {
        let policies = vec![RetentionPolicy::new("metrics", "default", 0, false)];
        let buckets = vec![bucket("b1", "metrics/default")];
        let pairs = pair_retention_policies(&policies, &buckets, &[]);

        assert_eq!(pairs[0].bucket.as_ref().map(|b| b.id.as_str()), Some("b1"));
        assert!(pairs[0].mapping.is_none());
        assert_eq!(
            pairs[0].decision(),
            Outcome::Planned(BucketOperation::CreateMapping {
                bucket_id: "b1".into()
            })
        );
    }

    #[test]
    fn bucket_and_mapping_present_is_up_to_date() {
        let policies = vec![RetentionPolicy::new("metrics", "autogen", 0, true)];
        let buckets = vec![bucket("b1", "metrics/autogen")];
        let mappings = vec![
            mapping("b1", "metrics", "other"),
            mapping("b1", "metrics", "autogen"),
        ];
        let pairs = pair_retention_policies(&policies, &buckets, &mappings);
        assert_eq!(
            pairs[0].mapping.as_ref().map(|m| m.retention_policy.as_str()),
            Some("autogen")
        );
        assert_eq!(pairs[0].decision(), Outcome::Skipped(SkipReason::UpToDate));
    }

    #[test]
    fn mapping_for_another_bucket_does_not_count() {
        let policies = vec![RetentionPolicy::new("metrics", "autogen", 0, true)];
        let buckets = vec![bucket("b1", "metrics/autogen")];
        let mappings = vec![mapping("b9", "metrics", "autogen")];
        let pairs = pair_retention_policies(&policies, &buckets, &mappings);
        assert!(pairs[0].mapping.is_none());
    }

    #[test]
    fn mapping_without_bucket_is_ignored() {
        let policies = vec![RetentionPolicy::new("metrics", "autogen", 0, true)];
        let mappings = vec![mapping("b1", "metrics", "autogen")];
        let pairs = pair_retention_policies(&policies, &[], &mappings);
        assert!(pairs[0].bucket.is_none());
        assert!(pairs[0].mapping.is_none());
    }

    #[test]
    fn duplicate_bucket_names_last_wins() {
        let policies = vec![RetentionPolicy::new("metrics", "autogen", 0, true)];
        let buckets = vec![bucket("b1", "metrics/autogen"), bucket("b2", "metrics/autogen")];
        let pairs = pair_retention_policies(&policies, &buckets, &[]);
        assert_eq!(pairs[0].bucket.as_ref().map(|b| b.id.as_str()), Some("b2"));
    }
}
