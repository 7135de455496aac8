//! The capabilities the migrator needs from a v1 source.

use crate::{
    errors::ApiResult,
    models::{retention_policy::RetentionPolicy, snapshot::SourceSnapshot, user::User},
    services::{files, v1_client::V1Client},
};
use std::path::Path;
use tracing::info;

/// Internal database of the v1 server, never migrated.
pub const INTERNAL_DATABASE: &str = "_internal";

/// Reads the v1 metadata. Provenance (live server or snapshot) does not
/// matter to the reconciler.
pub trait SourceApi {
    fn fetch_retention_policies(
        &self,
    ) -> impl Future<Output = ApiResult<Vec<RetentionPolicy>>> + Send;

    fn fetch_users(&self) -> impl Future<Output = ApiResult<Vec<User>>> + Send;
}

/// A source served from a previously captured snapshot file.
///
/// The file is read once when the value is built and lives as long as the run.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    snapshot: SourceSnapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: SourceSnapshot) -> Self {
        Self { snapshot }
    }

    pub async fn load(path: &Path) -> ApiResult<Self> {
        let snapshot = files::read_snapshot(path).await?;
        info!(
            "Loaded {} retention policies and {} users from {}",
            snapshot.dbrps.len(),
            snapshot.users.len(),
            path.display()
        );
        Ok(Self::new(snapshot))
    }
}

impl SourceApi for SnapshotSource {
    async fn fetch_retention_policies(&self) -> ApiResult<Vec<RetentionPolicy>> {
        Ok(self
            .snapshot
            .dbrps
            .iter()
            .filter(|rp| rp.database != INTERNAL_DATABASE)
            .cloned()
            .collect())
    }

    async fn fetch_users(&self) -> ApiResult<Vec<User>> {
        Ok(self.snapshot.users.clone())
    }
}

/// Either a live v1 server or a snapshot, chosen by configuration.
pub enum AnySource {
    Live(V1Client),
    Snapshot(SnapshotSource),
}

impl SourceApi for AnySource {
    async fn fetch_retention_policies(&self) -> ApiResult<Vec<RetentionPolicy>> {
        match self {
            AnySource::Live(client) => client.fetch_retention_policies().await,
            AnySource::Snapshot(snapshot) => snapshot.fetch_retention_policies().await,
        }
    }

    async fn fetch_users(&self) -> ApiResult<Vec<User>> {
        match self {
            AnySource::Live(client) => client.fetch_users().await,
            AnySource::Snapshot(snapshot) => snapshot.fetch_users().await,
        }
    }
}
