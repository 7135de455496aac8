//! Pairs v1 users with v2 legacy authorizations and decides whether a user's
//! authorization has to be (re)created.

use crate::{
    models::{
        authorization::{Action, LegacyAuthorization, Permission},
        user::User,
    },
    reconcile::{Outcome, SkipReason, retention::RetentionPolicyPairing},
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// A source user and the authorization already carrying its name, if any.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UserAuthorizationPairing {
    pub user: User,

    #[serde(rename = "v1Authorization", skip_serializing_if = "Option::is_none")]
    pub existing: Option<LegacyAuthorization>,
}

/// Permissions a user should hold, compared against what it holds now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequiredPermissions {
    pub needs_new_auth: bool,
    /// Sorted, deduplicated bucket ids.
    pub required_read: Vec<String>,
    /// Sorted, deduplicated bucket ids.
    pub required_write: Vec<String>,
    /// Full permission set for a new authorization. Empty unless `needs_new_auth`.
    pub permissions: Vec<Permission>,
}

/// Operation needed to bring one user's authorization in line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorizationOperation {
    Create {
        permissions: Vec<Permission>,
    },
    /// Delete `stale_id` first, then create. Legacy authorizations cannot be
    /// patched in place and token names are unique.
    Replace {
        stale_id: String,
        permissions: Vec<Permission>,
    },
}

impl AuthorizationOperation {
    pub fn permissions(&self) -> &[Permission] {
        match self {
            AuthorizationOperation::Create { permissions }
            | AuthorizationOperation::Replace { permissions, .. } => permissions,
        }
    }
}

/// Index authorizations by token name. Later entries win on duplicates.
pub fn index_authorizations_by_token(
    authorizations: &[LegacyAuthorization],
) -> HashMap<&str, &LegacyAuthorization> {
    authorizations
        .iter()
        .map(|a| (a.token_name.as_str(), a))
        .collect()
}

pub fn pair_users_to_authorizations(
    users: &[User],
    authorizations: &[LegacyAuthorization],
) -> Vec<UserAuthorizationPairing> {
    let by_token = index_authorizations_by_token(authorizations);
    users
        .iter()
        .map(|user| UserAuthorizationPairing {
            user: user.clone(),
            existing: by_token.get(user.name.as_str()).map(|a| (*a).clone()),
        })
        .collect()
}

/// Map each database to the ids of the buckets its policies resolved to.
///
/// Pairings without a bucket contribute nothing.
pub fn index_buckets_by_database(
    bucket_pairings: &[RetentionPolicyPairing],
) -> HashMap<&str, Vec<&str>> {
    let mut index: HashMap<&str, Vec<&str>> = HashMap::new();
    for pairing in bucket_pairings {
        if let Some(bucket) = &pairing.bucket {
            index
                .entry(pairing.policy.database.as_str())
                .or_default()
                .push(bucket.id.as_str());
        }
    }
    index
}

fn expand_databases<'a>(
    databases: &BTreeSet<String>,
    index: &HashMap<&str, Vec<&'a str>>,
) -> BTreeSet<&'a str> {
    databases
        .iter()
        .filter_map(|db| index.get(db.as_str()))
        .flatten()
        .copied()
        .collect()
}

/// Work out which bucket permissions the paired user needs and whether its
/// current authorization already grants exactly those.
///
/// Administrators and users without grants are skipped. Comparison is per
/// action on sets of bucket ids, so permission order and duplicates do not
/// matter.
pub fn resolve_required_permissions(
    pairing: &UserAuthorizationPairing,
    bucket_pairings: &[RetentionPolicyPairing],
    org_id: &str,
) -> Outcome<RequiredPermissions> {
    let user = &pairing.user;
    if user.is_admin {
        return Outcome::Skipped(SkipReason::Administrator);
    }
    if user.has_no_grants() {
        return Outcome::Skipped(SkipReason::NoGrants);
    }

    let index = index_buckets_by_database(bucket_pairings);
    let required_read = expand_databases(&user.read_databases, &index);
    let required_write = expand_databases(&user.write_databases, &index);

    let (actual_read, actual_write) = match &pairing.existing {
        Some(auth) => (
            auth.granted_buckets(Action::Read),
            auth.granted_buckets(Action::Write),
        ),
        None => (BTreeSet::new(), BTreeSet::new()),
    };

    let needs_new_auth = required_read != actual_read || required_write != actual_write;
    let permissions = if needs_new_auth {
        required_read
            .iter()
            .map(|id| Permission::bucket(Action::Read, *id, org_id))
            .chain(
                required_write
                    .iter()
                    .map(|id| Permission::bucket(Action::Write, *id, org_id)),
            )
            .collect()
    } else {
        Vec::new()
    };

    Outcome::Planned(RequiredPermissions {
        needs_new_auth,
        required_read: required_read.into_iter().map(str::to_string).collect(),
        required_write: required_write.into_iter().map(str::to_string).collect(),
        permissions,
    })
}

/// Turn a resolution into the operation the migrator has to run.
pub fn plan_authorization(
    pairing: &UserAuthorizationPairing,
    resolution: &Outcome<RequiredPermissions>,
) -> Outcome<AuthorizationOperation> {
    let required = match resolution {
        Outcome::Skipped(reason) => return Outcome::Skipped(*reason),
        Outcome::Planned(required) => required,
    };
    if !required.needs_new_auth {
        return Outcome::Skipped(SkipReason::UpToDate);
    }
    let permissions = required.permissions.clone();
    match &pairing.existing {
        Some(stale) => Outcome::Planned(AuthorizationOperation::Replace {
            stale_id: stale.id.clone(),
            permissions,
        }),
        None => Outcome::Planned(AuthorizationOperation::Create { permissions }),
    }
}
