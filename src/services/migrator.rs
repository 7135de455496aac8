//! Drives a run against the source and target. It fetches snapshots,
//! hands them to the pure reconcilers and executes the resulting operations
//! one entity at a time. A failing call is logged with the entity it belongs
//! to and recorded in the [`RunSummary`]; the remaining entities are still
//! processed. Only failures to read the initial snapshots abort the run.

use crate::{
    errors::ApiResult,
    models::{
        authorization::NewLegacyAuthorization,
        bucket::{NewBucket, NewDbrpMapping},
        snapshot::{SourceSnapshot, UsersFileEntry},
    },
    reconcile::{
        Outcome,
        authorization::{
            AuthorizationOperation, UserAuthorizationPairing, index_authorizations_by_token,
            pair_users_to_authorizations, plan_authorization, resolve_required_permissions,
        },
        deletion::{plan_authorization_deletions, plan_bucket_deletions, plan_bucket_deletions_by_name},
        retention::{BucketOperation, RetentionPolicyPairing, pair_retention_policies},
    },
    services::{
        files::{self, MappingReport, UserReport},
        source::SourceApi,
        target::TargetApi,
    },
};
use anyhow::{Context, Result};
use chrono::Utc;
use rand::{Rng, distr::Alphanumeric};
use std::{fmt::Display, path::PathBuf};
use tracing::{error, info, trace, warn};

const GENERATED_PASSWORD_LEN: usize = 20;

/// Optional outputs of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrateOptions {
    pub report_file: Option<PathBuf>,
    pub users_file: Option<PathBuf>,
    pub generate_passwords: bool,
}

/// Values resolved once at the start of a run and threaded through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub org_name: String,
    pub org_id: String,
}

impl RunContext {
    pub async fn resolve<T: TargetApi>(target: &T, org_name: &str) -> ApiResult<Self> {
        let org_id = target.resolve_org_id(org_name).await?;
        Ok(Self {
            org_name: org_name.to_string(),
            org_id,
        })
    }
}

/// Per-entity results of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl RunSummary {
    fn success(&mut self, entity: impl Into<String>) {
        self.succeeded.push(entity.into());
    }

    fn skip(&mut self, entity: impl Into<String>, reason: impl Display) {
        self.skipped.push(format!("{} ({reason})", entity.into()));
    }

    fn fail(&mut self, entity: impl Into<String>, err: impl Display) {
        self.failed.push((entity.into(), err.to_string()));
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn log(&self) {
        info!(
            succeeded = self.succeeded.len(),
            skipped = self.skipped.len(),
            failed = self.failed.len(),
            "Run summary"
        );
        for (entity, err) in &self.failed {
            error!(entity = %entity, error = %err, "failed");
        }
    }
}

/// Random alphanumeric password for a generated users file.
pub fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

pub struct Migrator<S, T> {
    source: S,
    target: T,
    ctx: RunContext,
}

impl<S: SourceApi, T: TargetApi> Migrator<S, T> {
    pub fn new(source: S, target: T, ctx: RunContext) -> Self {
        Self {
            source,
            target,
            ctx,
        }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Create missing buckets, DBRP mappings and legacy authorizations.
    pub async fn migrate(&self, options: &MigrateOptions) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        // every read happens before the first write
        let mut bucket_pairings = self.pair_buckets().await?;
        let user_pairings = self.pair_users().await?;

        info!("--- Migrating retention policies [{}] ---", bucket_pairings.len());
        for pairing in &mut bucket_pairings {
            self.apply_bucket_pairing(pairing, &mut summary).await;
        }

        info!("--- Migrating users [{}] ---", user_pairings.len());
        let mut reports = Vec::with_capacity(user_pairings.len());
        let mut created = Vec::new();
        for pairing in &user_pairings {
            let resolution =
                resolve_required_permissions(pairing, &bucket_pairings, &self.ctx.org_id);
            let decision = plan_authorization(pairing, &resolution);
            let (authorization_id, was_created) =
                self.apply_authorization(pairing, &decision, &mut summary).await;

            if let Some(id) = authorization_id.as_ref().filter(|_| was_created) {
                created.push(UsersFileEntry {
                    name: pairing.user.name.clone(),
                    password: options.generate_passwords.then(generate_password),
                    authorization_id: Some(id.clone()),
                });
            }

            let (required_read, required_write) = match &resolution {
                Outcome::Planned(required) => {
                    (required.required_read.clone(), required.required_write.clone())
                }
                Outcome::Skipped(_) => (Vec::new(), Vec::new()),
            };
            let outcome = match (&decision, was_created) {
                (Outcome::Skipped(reason), _) => format!("skipped: {reason}"),
                (Outcome::Planned(_), true) => "created".to_string(),
                (Outcome::Planned(_), false) => "failed".to_string(),
            };
            reports.push(UserReport {
                name: pairing.user.name.clone(),
                is_admin: pairing.user.is_admin,
                authorization_id,
                outcome,
                required_read,
                required_write,
            });
        }

        if let Some(path) = &options.report_file {
            let report = MappingReport {
                generated_at: Utc::now(),
                org: self.ctx.org_name.clone(),
                org_id: self.ctx.org_id.clone(),
                retention_policies: bucket_pairings,
                users: reports,
            };
            match files::write_report(path, &report).await {
                Ok(()) => info!("Mapping report written to {}", path.display()),
                Err(err) => {
                    error!(file = %path.display(), error = %err, "cannot write mapping report");
                    summary.fail(format!("report file {}", path.display()), err);
                }
            }
        }

        if let Some(path) = &options.users_file {
            match files::write_users_file(path, &created).await {
                Ok(()) => info!(
                    "Users file with {} entries written to {}",
                    created.len(),
                    path.display()
                ),
                Err(err) => {
                    error!(file = %path.display(), error = %err, "cannot write users file");
                    summary.fail(format!("users file {}", path.display()), err);
                }
            }
        }

        Ok(summary)
    }

    async fn pair_buckets(&self) -> Result<Vec<RetentionPolicyPairing>> {
        let policies = self
            .source
            .fetch_retention_policies()
            .await
            .context("fetching source retention policies")?;
        let buckets = self
            .target
            .fetch_buckets(&self.ctx.org_id)
            .await
            .context("fetching target buckets")?;
        let mappings = self
            .target
            .fetch_mappings(&self.ctx.org_id)
            .await
            .context("fetching target DBRP mappings")?;
        let pairings = pair_retention_policies(&policies, &buckets, &mappings);
        trace!(?pairings, "retention policy pairings");
        Ok(pairings)
    }

    async fn pair_users(&self) -> Result<Vec<UserAuthorizationPairing>> {
        let users = self
            .source
            .fetch_users()
            .await
            .context("fetching source users")?;
        let authorizations = self
            .target
            .fetch_authorizations(&self.ctx.org_id)
            .await
            .context("fetching target legacy authorizations")?;
        Ok(pair_users_to_authorizations(&users, &authorizations))
    }

    /// Create the bucket and/or mapping a pairing is missing. A created
    /// bucket is stored back into the pairing so that authorizations
    /// resolved later can reference it.
    async fn apply_bucket_pairing(
        &self,
        pairing: &mut RetentionPolicyPairing,
        summary: &mut RunSummary,
    ) {
        let name = pairing.bucket_name.clone();
        match pairing.decision() {
            Outcome::Skipped(reason) => {
                info!(bucket = %name, "bucket and DBRP mapping already exist");
                summary.skip(format!("bucket {name}"), reason);
                return;
            }
            Outcome::Planned(BucketOperation::CreateMapping { .. }) => {
                info!(bucket = %name, "bucket already exists");
            }
            Outcome::Planned(BucketOperation::CreateBucket) => {
                let request = NewBucket::for_policy(&pairing.policy, &self.ctx.org_id);
                match self.target.create_bucket(&request).await {
                    Ok(bucket) => {
                        info!(bucket = %name, id = %bucket.id, "bucket created");
                        summary.success(format!("bucket {name}"));
                        pairing.bucket = Some(bucket);
                    }
                    Err(err) => {
                        error!(bucket = %name, error = %err, "bucket cannot be created");
                        summary.fail(format!("bucket {name}"), err);
                        return;
                    }
                }
            }
        }

        let Some(bucket_id) = pairing.bucket.as_ref().map(|b| b.id.clone()) else {
            return;
        };
        let request = NewDbrpMapping::for_policy(&bucket_id, &pairing.policy, &self.ctx.org_id);
        let entity = format!(
            "DBRP mapping {}/{}",
            pairing.policy.database, pairing.policy.policy_name
        );
        match self.target.create_mapping(&request).await {
            Ok(mapping) => {
                info!(bucket = %name, "DBRP mapping created");
                summary.success(entity);
                pairing.mapping = Some(mapping);
            }
            Err(err) => {
                error!(bucket = %name, error = %err, "DBRP mapping cannot be created");
                summary.fail(entity, err);
            }
        }
    }

    /// Execute one user's decision. Returns the id of the authorization the
    /// user ends up with and whether it was created in this run.
    ///
    /// A replacement deletes the stale authorization before creating the new
    /// one; if the delete fails nothing is created.
    async fn apply_authorization(
        &self,
        pairing: &UserAuthorizationPairing,
        decision: &Outcome<AuthorizationOperation>,
        summary: &mut RunSummary,
    ) -> (Option<String>, bool) {
        let name = &pairing.user.name;
        let existing_id = pairing.existing.as_ref().map(|a| a.id.clone());
        let entity = format!("authorization {name}");

        let operation = match decision {
            Outcome::Skipped(reason) => {
                info!(user = %name, %reason, "authorization skipped");
                summary.skip(entity, reason);
                return (existing_id, false);
            }
            Outcome::Planned(operation) => operation,
        };

        if let AuthorizationOperation::Replace { stale_id, .. } = operation {
            if let Err(err) = self.target.delete_authorization(stale_id).await {
                error!(user = %name, id = %stale_id, error = %err, "stale authorization cannot be deleted");
                summary.fail(entity, err);
                return (existing_id, false);
            }
            info!(user = %name, id = %stale_id, "stale authorization deleted");
        }

        let request = NewLegacyAuthorization::for_user(
            name,
            &self.ctx.org_id,
            operation.permissions().to_vec(),
        );
        match self.target.create_authorization(&request).await {
            Ok(created) => {
                info!(
                    user = %name,
                    id = %created.id,
                    permissions = created.permissions.len(),
                    "authorization created"
                );
                summary.success(entity);
                (Some(created.id), true)
            }
            Err(err) => {
                error!(user = %name, error = %err, "authorization cannot be created");
                summary.fail(entity, err);
                (None, false)
            }
        }
    }

    /// Delete buckets by name, or the buckets of all source retention
    /// policies when `names` is empty.
    pub async fn delete_buckets(&self, names: &[String]) -> Result<RunSummary> {
        let buckets = self
            .target
            .fetch_buckets(&self.ctx.org_id)
            .await
            .context("fetching target buckets")?;
        let plan = if names.is_empty() {
            let policies = self
                .source
                .fetch_retention_policies()
                .await
                .context("fetching source retention policies")?;
            plan_bucket_deletions(&policies, &buckets)
        } else {
            plan_bucket_deletions_by_name(names, &buckets)
        };

        let mut summary = RunSummary::default();
        info!("--- Deleting buckets [{}] ---", plan.planned.len());
        for deletion in &plan.planned {
            let entity = format!("bucket {}", deletion.bucket_name);
            match self.target.delete_bucket(&deletion.bucket_id).await {
                Ok(()) => {
                    info!(bucket = %deletion.bucket_name, "bucket deleted");
                    summary.success(entity);
                }
                Err(err) => {
                    error!(bucket = %deletion.bucket_name, error = %err, "bucket cannot be deleted");
                    summary.fail(entity, err);
                }
            }
        }
        for (name, reason) in &plan.skipped {
            warn!(bucket = %name, %reason, "bucket skipped");
            summary.skip(format!("bucket {name}"), reason);
        }
        Ok(summary)
    }

    /// Delete the legacy authorizations of all non-admin source users.
    pub async fn delete_authorizations(&self) -> Result<RunSummary> {
        let users = self
            .source
            .fetch_users()
            .await
            .context("fetching source users")?;
        let authorizations = self
            .target
            .fetch_authorizations(&self.ctx.org_id)
            .await
            .context("fetching target legacy authorizations")?;
        let plan = plan_authorization_deletions(&users, &authorizations);

        let mut summary = RunSummary::default();
        info!("--- Deleting authorizations [{}] ---", plan.planned.len());
        for deletion in &plan.planned {
            let entity = format!("authorization {}", deletion.user_name);
            match self
                .target
                .delete_authorization(&deletion.authorization_id)
                .await
            {
                Ok(()) => {
                    info!(user = %deletion.user_name, "authorization deleted");
                    summary.success(entity);
                }
                Err(err) => {
                    error!(user = %deletion.user_name, error = %err, "authorization cannot be deleted");
                    summary.fail(entity, err);
                }
            }
        }
        for (name, reason) in &plan.skipped {
            warn!(user = %name, %reason, "authorization skipped");
            summary.skip(format!("authorization {name}"), reason);
        }
        Ok(summary)
    }
}

/// Capture the source metadata into a snapshot document.
pub async fn dump_source<S: SourceApi>(source: &S) -> Result<SourceSnapshot> {
    Ok(SourceSnapshot {
        dbrps: source
            .fetch_retention_policies()
            .await
            .context("fetching source retention policies")?,
        users: source.fetch_users().await.context("fetching source users")?,
    })
}

/// Set passwords of migrated users from users-file entries.
///
/// The authorization is looked up by token name. An entry's own password
/// wins over `default_password`; entries with neither are skipped.
pub async fn set_passwords<T: TargetApi>(
    target: &T,
    ctx: &RunContext,
    entries: &[UsersFileEntry],
    default_password: Option<&str>,
) -> Result<RunSummary> {
    let authorizations = target
        .fetch_authorizations(&ctx.org_id)
        .await
        .context("fetching target legacy authorizations")?;
    let by_token = index_authorizations_by_token(&authorizations);

    let mut summary = RunSummary::default();
    info!("--- Setting passwords for users [{}] ---", entries.len());
    for entry in entries {
        let entity = format!("password {}", entry.name);
        let Some(authorization) = by_token.get(entry.name.as_str()) else {
            warn!(user = %entry.name, "ignored, no existing authorization found");
            summary.skip(entity, "no authorization");
            continue;
        };
        let (password, origin) = match (entry.password.as_deref(), default_password) {
            (Some(password), _) => (password, "users file"),
            (None, Some(password)) => (password, "default"),
            (None, None) => {
                warn!(user = %entry.name, "ignored, no password specified");
                summary.skip(entity, "no password");
                continue;
            }
        };
        match target.set_password(&authorization.id, password).await {
            Ok(()) => {
                info!(user = %entry.name, "password set from {origin}");
                summary.success(entity);
            }
            Err(err) => {
                error!(user = %entry.name, error = %err, "unable to set password");
                summary.fail(entity, err);
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::ApiError,
        models::{
            authorization::{Action, LegacyAuthorization, Permission},
            bucket::{Bucket, DbrpMapping},
            retention_policy::RetentionPolicy,
            user::User,
        },
        services::{
            memory_target::{InMemoryTarget, TargetCall, TargetState},
            source::SnapshotSource,
        },
    };
    use tempfile::TempDir;

    fn ctx() -> RunContext {
        RunContext {
            org_name: "my-org".into(),
            org_id: "org1".into(),
        }
    }

    fn source() -> SnapshotSource {
        SnapshotSource::new(SourceSnapshot {
            dbrps: vec![
                RetentionPolicy::new("metrics", "autogen", 0, true),
                RetentionPolicy::new("metrics", "weekly", 604_800, false),
                RetentionPolicy::new("logs", "autogen", 0, true),
            ],
            users: vec![
                User::admin("root"),
                User::new("alice").with_read(["metrics"]),
                User::new("bob").with_read(["logs"]).with_write(["logs"]),
                User::new("nobody"),
            ],
        })
    }

    fn authorization(id: &str, token: &str, permissions: Vec<Permission>) -> LegacyAuthorization {
        LegacyAuthorization {
            id: id.into(),
            token_name: token.into(),
            description: None,
            org_id: "org1".into(),
            permissions,
            status: "active".into(),
        }
    }

    /// Source whose user listing fails after its policies were read.
    struct UsersUnavailable(SnapshotSource);

    impl SourceApi for UsersUnavailable {
        async fn fetch_retention_policies(&self) -> ApiResult<Vec<RetentionPolicy>> {
            self.0.fetch_retention_policies().await
        }

        async fn fetch_users(&self) -> ApiResult<Vec<User>> {
            Err(ApiError::status("GET", "/query", 500, "users unavailable"))
        }
    }

    #[tokio::test]
    async fn failed_user_fetch_aborts_before_any_write() {
        let migrator = Migrator::new(
            UsersUnavailable(source()),
            InMemoryTarget::new("my-org", "org1"),
            ctx(),
        );
        assert!(migrator.migrate(&MigrateOptions::default()).await.is_err());
        assert!(migrator.target().calls().is_empty());
    }

    #[tokio::test]
    async fn migrates_everything_into_empty_target() {
        let migrator = Migrator::new(source(), InMemoryTarget::new("my-org", "org1"), ctx());
        let summary = migrator.migrate(&MigrateOptions::default()).await.unwrap();
        assert!(summary.is_success());

        let state = migrator.target().state();
        let mut names: Vec<_> = state.buckets.iter().map(|b| b.name.as_str()).collect();
        names.sort();
        assert_eq!(names, ["logs/autogen", "metrics/autogen", "metrics/weekly"]);
        assert_eq!(state.mappings.len(), 3);

        let weekly = state.buckets.iter().find(|b| b.name == "metrics/weekly").unwrap();
        assert_eq!(weekly.retention_rules[0].every_seconds, 604_800);

        let mut tokens: Vec<_> = state.authorizations.iter().map(|a| a.token_name.as_str()).collect();
        tokens.sort();
        assert_eq!(tokens, ["alice", "bob"]);
        let alice = state.authorizations.iter().find(|a| a.token_name == "alice").unwrap();
        assert_eq!(alice.granted_buckets(Action::Read).len(), 2);
        assert!(alice.granted_buckets(Action::Write).is_empty());
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let migrator = Migrator::new(source(), InMemoryTarget::new("my-org", "org1"), ctx());
        migrator.migrate(&MigrateOptions::default()).await.unwrap();
        let writes = migrator.target().calls().len();

        let second = migrator.migrate(&MigrateOptions::default()).await.unwrap();
        assert!(second.is_success());
        assert!(second.succeeded.is_empty());
        assert_eq!(migrator.target().calls().len(), writes);
    }

    #[tokio::test]
    async fn existing_bucket_only_gets_mapping() {
        let target = InMemoryTarget::new("my-org", "org1").with_state(TargetState {
            buckets: vec![Bucket {
                id: "b1".into(),
                name: "metrics/default".into(),
                org_id: "org1".into(),
                retention_rules: Vec::new(),
            }],
            ..TargetState::default()
        });
        let source = SnapshotSource::new(SourceSnapshot {
            dbrps: vec![RetentionPolicy::new("metrics", "default", 0, false)],
            users: Vec::new(),
        });
        let migrator = Migrator::new(source, target, ctx());
        migrator.migrate(&MigrateOptions::default()).await.unwrap();

        assert_eq!(
            migrator.target().calls(),
            vec![TargetCall::CreateMapping {
                bucket_id: "b1".into(),
                database: "metrics".into(),
                retention_policy: "default".into(),
            }]
        );
    }

    #[tokio::test]
    async fn stale_authorization_is_deleted_before_replacement() {
        let target = InMemoryTarget::new("my-org", "org1").with_state(TargetState {
            buckets: vec![Bucket {
                id: "b1".into(),
                name: "metrics/autogen".into(),
                org_id: "org1".into(),
                retention_rules: Vec::new(),
            }],
            mappings: vec![DbrpMapping {
                id: Some("m1".into()),
                bucket_id: "b1".into(),
                database: "metrics".into(),
                retention_policy: "autogen".into(),
                is_default: true,
                org_id: Some("org1".into()),
            }],
            authorizations: vec![authorization(
                "old",
                "alice",
                vec![Permission::bucket(Action::Write, "b1", "org1")],
            )],
            ..TargetState::default()
        });
        let source = SnapshotSource::new(SourceSnapshot {
            dbrps: vec![RetentionPolicy::new("metrics", "autogen", 0, true)],
            users: vec![User::new("alice").with_read(["metrics"])],
        });
        let migrator = Migrator::new(source, target, ctx());
        let summary = migrator.migrate(&MigrateOptions::default()).await.unwrap();
        assert!(summary.is_success());

        assert_eq!(
            migrator.target().calls(),
            vec![
                TargetCall::DeleteAuthorization { id: "old".into() },
                TargetCall::CreateAuthorization {
                    token_name: "alice".into()
                },
            ]
        );
        let state = migrator.target().state();
        assert_eq!(state.authorizations.len(), 1);
        assert_eq!(
            state.authorizations[0].permissions,
            vec![Permission::bucket(Action::Read, "b1", "org1")]
        );
    }

    #[tokio::test]
    async fn failed_delete_prevents_replacement() {
        let target = InMemoryTarget::new("my-org", "org1")
            .with_state(TargetState {
                authorizations: vec![authorization("old", "alice", Vec::new())],
                ..TargetState::default()
            })
            .fail_on("old");
        let source = SnapshotSource::new(SourceSnapshot {
            dbrps: vec![RetentionPolicy::new("metrics", "autogen", 0, true)],
            users: vec![User::new("alice").with_read(["metrics"])],
        });
        let migrator = Migrator::new(source, target, ctx());
        let summary = migrator.migrate(&MigrateOptions::default()).await.unwrap();

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "authorization alice");
        assert!(
            !migrator
                .target()
                .calls()
                .iter()
                .any(|c| matches!(c, TargetCall::CreateAuthorization { .. }))
        );
    }

    #[tokio::test]
    async fn one_failing_bucket_does_not_stop_the_batch() {
        let target = InMemoryTarget::new("my-org", "org1").fail_on("metrics/autogen");
        let migrator = Migrator::new(source(), target, ctx());
        let summary = migrator.migrate(&MigrateOptions::default()).await.unwrap();

        assert!(!summary.is_success());
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "bucket metrics/autogen");

        let state = migrator.target().state();
        assert_eq!(state.buckets.len(), 2);
        // alice still gets the bucket that did get created
        let alice = state.authorizations.iter().find(|a| a.token_name == "alice").unwrap();
        assert_eq!(alice.granted_buckets(Action::Read).len(), 1);
    }

    #[tokio::test]
    async fn writes_report_and_users_file() {
        let dir = TempDir::new().unwrap();
        let options = MigrateOptions {
            report_file: Some(dir.path().join("report.json")),
            users_file: Some(dir.path().join("users.json")),
            generate_passwords: true,
        };
        let migrator = Migrator::new(source(), InMemoryTarget::new("my-org", "org1"), ctx());
        migrator.migrate(&options).await.unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("report.json")).unwrap())
                .unwrap();
        assert_eq!(report["retentionPolicies"].as_array().unwrap().len(), 3);
        assert_eq!(report["users"][0]["name"], "root");
        assert_eq!(report["users"][0]["outcome"], "skipped: administrator");
        assert_eq!(report["users"][3]["outcome"], "skipped: no grants");

        let users = files::read_users_file(&dir.path().join("users.json")).await.unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u.password.as_ref().map(String::len) == Some(20)));
        assert!(users.iter().all(|u| u.authorization_id.is_some()));
    }

    #[tokio::test]
    async fn deletes_what_migration_created() {
        let migrator = Migrator::new(source(), InMemoryTarget::new("my-org", "org1"), ctx());
        migrator.migrate(&MigrateOptions::default()).await.unwrap();

        let buckets = migrator.delete_buckets(&[]).await.unwrap();
        assert_eq!(buckets.succeeded.len(), 3);
        let auths = migrator.delete_authorizations().await.unwrap();
        assert_eq!(auths.succeeded.len(), 2);
        // nobody has no authorization and is reported, root is an admin and is not
        assert_eq!(auths.skipped, ["authorization nobody (not found)"]);

        let state = migrator.target().state();
        assert!(state.buckets.is_empty());
        assert!(state.mappings.is_empty());
        assert!(state.authorizations.is_empty());
    }

    #[tokio::test]
    async fn deletes_named_buckets_and_skips_unknown() {
        let migrator = Migrator::new(source(), InMemoryTarget::new("my-org", "org1"), ctx());
        migrator.migrate(&MigrateOptions::default()).await.unwrap();

        let summary = migrator
            .delete_buckets(&["logs/autogen".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(summary.succeeded, ["bucket logs/autogen"]);
        assert_eq!(summary.skipped, ["bucket missing (not found)"]);
        assert_eq!(migrator.target().state().buckets.len(), 2);
    }

    #[tokio::test]
    async fn sets_passwords_from_entries_or_default() {
        let target = InMemoryTarget::new("my-org", "org1").with_state(TargetState {
            authorizations: vec![
                authorization("a1", "alice", Vec::new()),
                authorization("a2", "bob", Vec::new()),
            ],
            ..TargetState::default()
        });
        let entries = vec![
            UsersFileEntry {
                name: "alice".into(),
                password: Some("own".into()),
                authorization_id: None,
            },
            UsersFileEntry {
                name: "bob".into(),
                password: None,
                authorization_id: None,
            },
            UsersFileEntry {
                name: "ghost".into(),
                password: Some("x".into()),
                authorization_id: None,
            },
        ];

        let summary = set_passwords(&target, &ctx(), &entries, Some("fallback"))
            .await
            .unwrap();
        assert_eq!(summary.succeeded.len(), 2);
        assert_eq!(summary.skipped.len(), 1);

        let passwords = target.state().passwords;
        assert_eq!(passwords["a1"], "own");
        assert_eq!(passwords["a2"], "fallback");

        let without_default = set_passwords(&target, &ctx(), &entries[1..2], None).await.unwrap();
        assert_eq!(without_default.skipped, ["password bob (no password)"]);
    }

    #[tokio::test]
    async fn dump_captures_source() {
        let snapshot = dump_source(&source()).await.unwrap();
        assert_eq!(snapshot.dbrps.len(), 3);
        assert_eq!(snapshot.users.len(), 4);
    }

    #[tokio::test]
    async fn unknown_org_fails_resolution() {
        let target = InMemoryTarget::new("my-org", "org1");
        assert!(RunContext::resolve(&target, "other").await.is_err());
        assert_eq!(RunContext::resolve(&target, "my-org").await.unwrap(), ctx());
    }

    #[test]
    fn generated_passwords_are_alphanumeric() {
        let password = generate_password();
        assert_eq!(password.len(), GENERATED_PASSWORD_LEN);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(password, generate_password());
    }
}
