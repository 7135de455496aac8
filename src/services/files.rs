//! JSON documents written and read around a run: the source snapshot, the
//! mapping report and the generated users file.
//!
//! Writes go to a temporary file next to the destination and are renamed
//! into place, so a crash never leaves a half-written document behind.

use crate::{
    errors::ApiResult,
    models::snapshot::{SourceSnapshot, UsersFileEntry},
    reconcile::retention::RetentionPolicyPairing,
};
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Audit record of what a migration run found and decided.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MappingReport {
    pub generated_at: DateTime<Utc>,
    pub org: String,
    #[serde(rename = "orgID")]
    pub org_id: String,
    pub retention_policies: Vec<RetentionPolicyPairing>,
    pub users: Vec<UserReport>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserReport {
    pub name: String,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_id: Option<String>,
    pub outcome: String,
    pub required_read: Vec<String>,
    pub required_write: Vec<String>,
}

pub async fn read_snapshot(path: &Path) -> ApiResult<SourceSnapshot> {
    read_json(path).await
}

pub async fn write_snapshot(path: &Path, snapshot: &SourceSnapshot) -> ApiResult<()> {
    write_json(path, snapshot).await
}

pub async fn write_report(path: &Path, report: &MappingReport) -> ApiResult<()> {
    write_json(path, report).await
}

pub async fn read_users_file(path: &Path) -> ApiResult<Vec<UsersFileEntry>> {
    read_json(path).await
}

pub async fn write_users_file(path: &Path, entries: &[UsersFileEntry]) -> ApiResult<()> {
    write_json(path, &entries).await
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> ApiResult<T> {
    let bytes = fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> ApiResult<()> {
    let body = serde_json::to_vec_pretty(value)?;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&parent).await?;

    let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
    if let Err(err) = fs::write(&tmp_path, &body).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err.into());
    }
    if let Err(err) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err.into());
    }
    debug!("wrote {} bytes to {}", body.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{retention_policy::RetentionPolicy, user::User};
    use tempfile::TempDir;

    #[tokio::test]
    async fn snapshot_survives_a_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("v1-meta.json");
        let snapshot = SourceSnapshot {
            dbrps: vec![RetentionPolicy::new("metrics", "autogen", 0, true)],
            users: vec![User::new("alice").with_read(["metrics"])],
        };

        write_snapshot(&path, &snapshot).await.unwrap();
        assert_eq!(read_snapshot(&path).await.unwrap(), snapshot);

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn reads_handwritten_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(
            &path,
            r#"{"dbrps":[{"db":"metrics","rp":"autogen","durationSeconds":0,"default":true}]}"#,
        )
        .unwrap();
        let snapshot = read_snapshot(&path).await.unwrap();
        assert_eq!(snapshot.dbrps.len(), 1);
        assert!(snapshot.users.is_empty());
    }

    #[tokio::test]
    async fn users_file_omits_missing_password() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        let entries = vec![UsersFileEntry {
            name: "alice".into(),
            password: None,
            authorization_id: Some("a1".into()),
        }];
        write_users_file(&path, &entries).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("authorizationId"));
        assert!(!raw.contains("password"));
        assert_eq!(read_users_file(&path).await.unwrap(), entries);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(read_users_file(&path).await.is_err());
        assert!(read_users_file(&dir.path().join("missing.json")).await.is_err());
    }
}
