//! Plans removal of the target entities a migration created.
//!
//! Lookups go through the same name derivation and indexes as pairing, so
//! the create and delete paths agree on what counts as the same entity.

use crate::{
    models::{
        authorization::LegacyAuthorization, bucket::Bucket, retention_policy::RetentionPolicy,
        user::User,
    },
    reconcile::{
        SkipReason, authorization::index_authorizations_by_token,
        retention::index_buckets_by_name,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketDeletion {
    pub bucket_name: String,
    pub bucket_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationDeletion {
    pub user_name: String,
    pub authorization_id: String,
}

/// Entities to delete plus the names that had nothing to delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletionPlan<T> {
    pub planned: Vec<T>,
    pub skipped: Vec<(String, SkipReason)>,
}

impl<T> Default for DeletionPlan<T> {
    fn default() -> Self {
        Self {
            planned: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Plan deletion of the buckets the given source policies migrate into.
pub fn plan_bucket_deletions(
    policies: &[RetentionPolicy],
    buckets: &[Bucket],
) -> DeletionPlan<BucketDeletion> {
    let names: Vec<String> = policies.iter().map(RetentionPolicy::bucket_name).collect();
    plan_bucket_deletions_by_name(&names, buckets)
}

/// Plan deletion of explicitly named buckets.
pub fn plan_bucket_deletions_by_name(
    names: &[String],
    buckets: &[Bucket],
) -> DeletionPlan<BucketDeletion> {
    let by_name = index_buckets_by_name(buckets);
    let mut plan = DeletionPlan::default();
    for name in names {
        match by_name.get(name.as_str()) {
            Some(bucket) => plan.planned.push(BucketDeletion {
                bucket_name: name.clone(),
                bucket_id: bucket.id.clone(),
            }),
            None => plan.skipped.push((name.clone(), SkipReason::NotFound)),
        }
    }
    plan
}

/// Plan deletion of the authorizations created for non-admin source users.
///
/// Administrators are never touched and do not show up as skipped either.
pub fn plan_authorization_deletions(
    users: &[User],
    authorizations: &[LegacyAuthorization],
) -> DeletionPlan<AuthorizationDeletion> {
    let by_token = index_authorizations_by_token(authorizations);
    let mut plan = DeletionPlan::default();
    for user in users.iter().filter(|u| !u.is_admin) {
        match by_token.get(user.name.as_str()) {
            Some(auth) => plan.planned.push(AuthorizationDeletion {
                user_name: user.name.clone(),
                authorization_id: auth.id.clone(),
            }),
            None => plan.skipped.push((user.name.clone(), SkipReason::NotFound)),
        }
    }
    plan
}
