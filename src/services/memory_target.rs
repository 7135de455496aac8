//! An in-memory v2 target.
//!
//! Seeded from a live target it backs `--dry-run`: the migrator runs its
//! full plan against the copy and every write is recorded as a
//! [`TargetCall`] instead of reaching the server. Tests use it directly.

use crate::{
    errors::{ApiError, ApiResult},
    models::{
        authorization::{LegacyAuthorization, NewLegacyAuthorization},
        bucket::{Bucket, DbrpMapping, NewBucket, NewDbrpMapping},
    },
    services::{migrator::RunContext, target::TargetApi},
};
use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};
use uuid::Uuid;

/// A write performed against the target, in execution order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetCall {
    CreateBucket { name: String },
    CreateMapping { bucket_id: String, database: String, retention_policy: String },
    DeleteBucket { id: String },
    CreateAuthorization { token_name: String },
    DeleteAuthorization { id: String },
    SetPassword { id: String },
}

impl fmt::Display for TargetCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetCall::CreateBucket { name } => write!(f, "create bucket {name}"),
            TargetCall::CreateMapping {
                bucket_id,
                database,
                retention_policy,
            } => write!(
                f,
                "create DBRP mapping {database}/{retention_policy} -> bucket {bucket_id}"
            ),
            TargetCall::DeleteBucket { id } => write!(f, "delete bucket {id}"),
            TargetCall::CreateAuthorization { token_name } => {
                write!(f, "create legacy authorization for {token_name}")
            }
            TargetCall::DeleteAuthorization { id } => {
                write!(f, "delete legacy authorization {id}")
            }
            TargetCall::SetPassword { id } => write!(f, "set password of authorization {id}"),
        }
    }
}

/// Contents of the in-memory target.
#[derive(Clone, Debug, Default)]
pub struct TargetState {
    pub buckets: Vec<Bucket>,
    pub mappings: Vec<DbrpMapping>,
    pub authorizations: Vec<LegacyAuthorization>,
    /// Passwords by authorization id.
    pub passwords: HashMap<String, String>,
}

pub struct InMemoryTarget {
    org_name: String,
    org_id: String,
    state: Mutex<TargetState>,
    calls: Mutex<Vec<TargetCall>>,
    /// Bucket names, token names or ids whose writes fail.
    failing: HashSet<String>,
}

impl InMemoryTarget {
    pub fn new(org_name: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            org_name: org_name.into(),
            org_id: org_id.into(),
            state: Mutex::new(TargetState::default()),
            calls: Mutex::new(Vec::new()),
            failing: HashSet::new(),
        }
    }

    pub fn with_state(self, state: TargetState) -> Self {
        Self {
            state: Mutex::new(state),
            ..self
        }
    }

    /// Copy the current contents of `target` for the run's organization.
    pub async fn mirror<T: TargetApi>(target: &T, ctx: &RunContext) -> ApiResult<Self> {
        let state = TargetState {
            buckets: target.fetch_buckets(&ctx.org_id).await?,
            mappings: target.fetch_mappings(&ctx.org_id).await?,
            authorizations: target.fetch_authorizations(&ctx.org_id).await?,
            passwords: HashMap::new(),
        };
        Ok(Self::new(ctx.org_name.clone(), ctx.org_id.clone()).with_state(state))
    }

    #[cfg(test)]
    pub fn fail_on(mut self, key: impl Into<String>) -> Self {
        self.failing.insert(key.into());
        self
    }

    pub fn calls(&self) -> Vec<TargetCall> {
        lock(&self.calls).clone()
    }

    #[cfg(test)]
    pub fn state(&self) -> TargetState {
        lock(&self.state).clone()
    }

    fn next_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    fn check_failure(&self, method: &'static str, path: &str, key: &str) -> ApiResult<()> {
        if self.failing.contains(key) {
            return Err(ApiError::status(method, path, 500, format!("write to {key} rejected")));
        }
        Ok(())
    }

    fn record(&self, call: TargetCall) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TargetApi for InMemoryTarget {
    async fn resolve_org_id(&self, org_name: &str) -> ApiResult<String> {
        if org_name == self.org_name {
            Ok(self.org_id.clone())
        } else {
            Err(ApiError::OrgNotFound(org_name.to_string()))
        }
    }

    async fn fetch_buckets(&self, org_id: &str) -> ApiResult<Vec<Bucket>> {
        Ok(lock(&self.state)
            .buckets
            .iter()
            .filter(|b| b.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn fetch_mappings(&self, _org_id: &str) -> ApiResult<Vec<DbrpMapping>> {
        Ok(lock(&self.state).mappings.clone())
    }

    async fn fetch_authorizations(&self, org_id: &str) -> ApiResult<Vec<LegacyAuthorization>> {
        Ok(lock(&self.state)
            .authorizations
            .iter()
            .filter(|a| a.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn create_bucket(&self, bucket: &NewBucket) -> ApiResult<Bucket> {
        self.check_failure("POST", "/api/v2/buckets", &bucket.name)?;
        let mut state = lock(&self.state);
        if state
            .buckets
            .iter()
            .any(|b| b.name == bucket.name && b.org_id == bucket.org_id)
        {
            return Err(ApiError::status(
                "POST",
                "/api/v2/buckets",
                422,
                format!("bucket with name {} already exists", bucket.name),
            ));
        }
        let created = Bucket {
            id: Self::next_id(),
            name: bucket.name.clone(),
            org_id: bucket.org_id.clone(),
            retention_rules: bucket.retention_rules.clone(),
        };
        state.buckets.push(created.clone());
        self.record(TargetCall::CreateBucket {
            name: created.name.clone(),
        });
        Ok(created)
    }

    async fn create_mapping(&self, mapping: &NewDbrpMapping) -> ApiResult<DbrpMapping> {
        self.check_failure("POST", "/api/v2/dbrps", &mapping.bucket_id)?;
        let mut state = lock(&self.state);
        if !state.buckets.iter().any(|b| b.id == mapping.bucket_id) {
            return Err(ApiError::BucketNotFound(mapping.bucket_id.clone()));
        }
        let created = DbrpMapping {
            id: Some(Self::next_id()),
            bucket_id: mapping.bucket_id.clone(),
            database: mapping.database.clone(),
            retention_policy: mapping.retention_policy.clone(),
            is_default: mapping.is_default,
            org_id: Some(mapping.org_id.clone()),
        };
        state.mappings.push(created.clone());
        self.record(TargetCall::CreateMapping {
            bucket_id: created.bucket_id.clone(),
            database: created.database.clone(),
            retention_policy: created.retention_policy.clone(),
        });
        Ok(created)
    }

    async fn delete_bucket(&self, bucket_id: &str) -> ApiResult<()> {
        self.check_failure("DELETE", "/api/v2/buckets", bucket_id)?;
        let mut state = lock(&self.state);
        let before = state.buckets.len();
        state.buckets.retain(|b| b.id != bucket_id);
        if state.buckets.len() == before {
            return Err(ApiError::BucketNotFound(bucket_id.to_string()));
        }
        // mappings die with their bucket
        state.mappings.retain(|m| m.bucket_id != bucket_id);
        self.record(TargetCall::DeleteBucket {
            id: bucket_id.to_string(),
        });
        Ok(())
    }

    async fn create_authorization(
        &self,
        authorization: &NewLegacyAuthorization,
    ) -> ApiResult<LegacyAuthorization> {
        self.check_failure(
            "POST",
            "/private/legacy/authorizations",
            &authorization.token_name,
        )?;
        let mut state = lock(&self.state);
        if state
            .authorizations
            .iter()
            .any(|a| a.token_name == authorization.token_name)
        {
            return Err(ApiError::status(
                "POST",
                "/private/legacy/authorizations",
                422,
                format!("token {} already exists", authorization.token_name),
            ));
        }
        let created = LegacyAuthorization {
            id: Self::next_id(),
            token_name: authorization.token_name.clone(),
            description: Some(authorization.description.clone()),
            org_id: authorization.org_id.clone(),
            permissions: authorization.permissions.clone(),
            status: authorization.status.clone(),
        };
        state.authorizations.push(created.clone());
        self.record(TargetCall::CreateAuthorization {
            token_name: created.token_name.clone(),
        });
        Ok(created)
    }

    async fn delete_authorization(&self, authorization_id: &str) -> ApiResult<()> {
        self.check_failure("DELETE", "/private/legacy/authorizations", authorization_id)?;
        let mut state = lock(&self.state);
        let before = state.authorizations.len();
        state.authorizations.retain(|a| a.id != authorization_id);
        if state.authorizations.len() == before {
            return Err(ApiError::AuthorizationNotFound(authorization_id.to_string()));
        }
        state.passwords.remove(authorization_id);
        self.record(TargetCall::DeleteAuthorization {
            id: authorization_id.to_string(),
        });
        Ok(())
    }

    async fn set_password(&self, authorization_id: &str, password: &str) -> ApiResult<()> {
        self.check_failure("POST", "/private/legacy/authorizations", authorization_id)?;
        let mut state = lock(&self.state);
        if !state.authorizations.iter().any(|a| a.id == authorization_id) {
            return Err(ApiError::AuthorizationNotFound(authorization_id.to_string()));
        }
        state
            .passwords
            .insert(authorization_id.to_string(), password.to_string());
        self.record(TargetCall::SetPassword {
            id: authorization_id.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::retention_policy::RetentionPolicy;

    #[tokio::test]
    async fn duplicate_token_names_are_rejected() {
        let target = InMemoryTarget::new("my-org", "org1");
        let request = NewLegacyAuthorization::for_user("alice", "org1", Vec::new());
        target.create_authorization(&request).await.unwrap();
        let err = target.create_authorization(&request).await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 422, .. }));
    }

    #[tokio::test]
    async fn deleting_bucket_drops_its_mappings() {
        let target = InMemoryTarget::new("my-org", "org1");
        let rp = RetentionPolicy::new("metrics", "autogen", 0, true);
        let bucket = target
            .create_bucket(&NewBucket::for_policy(&rp, "org1"))
            .await
            .unwrap();
        target
            .create_mapping(&NewDbrpMapping::for_policy(&bucket.id, &rp, "org1"))
            .await
            .unwrap();

        target.delete_bucket(&bucket.id).await.unwrap();
        let state = target.state();
        assert!(state.buckets.is_empty());
        assert!(state.mappings.is_empty());
        assert_eq!(target.calls().len(), 3);
        assert!(target.delete_bucket(&bucket.id).await.is_err());
    }

    #[tokio::test]
    async fn mirror_copies_the_org_contents() {
        let source = InMemoryTarget::new("my-org", "org1");
        let rp = RetentionPolicy::new("metrics", "autogen", 0, true);
        source
            .create_bucket(&NewBucket::for_policy(&rp, "org1"))
            .await
            .unwrap();
        let ctx = RunContext::resolve(&source, "my-org").await.unwrap();

        let copy = InMemoryTarget::mirror(&source, &ctx).await.unwrap();
        assert_eq!(copy.state().buckets.len(), 1);
        assert!(copy.calls().is_empty());
        assert_eq!(copy.resolve_org_id("my-org").await.unwrap(), "org1");
    }

    #[test]
    fn calls_read_as_sentences() {
        let call = TargetCall::CreateMapping {
            bucket_id: "b1".into(),
            database: "metrics".into(),
            retention_policy: "autogen".into(),
        };
        assert_eq!(call.to_string(), "create DBRP mapping metrics/autogen -> bucket b1");
    }
}
