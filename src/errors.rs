use std::io;
use thiserror::Error;

/// Failure of a call against the v1 source, the v2 target, or a local file.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{method} {path} failed with status {status}: {body}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
        body: String,
    },
    #[error("query `{command}` returned error: {message}")]
    Query { command: String, message: String },
    #[error("no organization named `{0}` found")]
    OrgNotFound(String),
    #[error("authorization `{0}` not found")]
    AuthorizationNotFound(String),
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Shortcut for a non-success HTTP response.
    pub fn status(
        method: &'static str,
        path: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self::Status {
            method,
            path: path.into(),
            status,
            body: body.into(),
        }
    }
}

/// Problems with the run configuration. Always fatal, raised before any
/// reconciliation starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required option --{option} (or environment variable {env})")]
    Missing {
        option: &'static str,
        env: &'static str,
    },
    #[error("invalid value `{value}` for {option}: {reason}")]
    Invalid {
        option: &'static str,
        value: String,
        reason: String,
    },
}
