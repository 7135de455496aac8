//! Client for the v1 `/query` endpoint and parsers for the `SHOW ...`
//! statements the migration relies on.

use crate::{
    config::SourceConfig,
    errors::{ApiError, ApiResult},
    models::{retention_policy::RetentionPolicy, user::User},
    reconcile::duration::parse_duration,
    services::source::{INTERNAL_DATABASE, SourceApi},
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{trace, warn};

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    results: Option<Vec<QueryResult>>,
}

/// One statement result of a v1 query response.
#[derive(Debug, Default, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub series: Vec<Series>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl QueryResult {
    /// First series, with a lookup of the requested column positions.
    fn table<const N: usize>(&self, names: [&str; N]) -> Option<(&Series, [Option<usize>; N])> {
        let series = self.series.first()?;
        let positions = names.map(|name| series.columns.iter().position(|c| c == name));
        Some((series, positions))
    }
}

fn cell_str(row: &[Value], index: Option<usize>) -> Option<&str> {
    index.and_then(|i| row.get(i)).and_then(Value::as_str)
}

fn cell_true(row: &[Value], index: Option<usize>) -> bool {
    index.and_then(|i| row.get(i)).and_then(Value::as_bool) == Some(true)
}

/// Quote an identifier for use inside an InfluxQL statement.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Database names from `SHOW DATABASES`, sorted, without `_internal`.
pub fn parse_databases(result: &QueryResult) -> Vec<String> {
    let Some((series, _)) = result.table([]) else {
        return Vec::new();
    };
    let mut databases: Vec<String> = series
        .values
        .iter()
        .filter_map(|row| cell_str(row, Some(0)))
        .filter(|db| *db != INTERNAL_DATABASE)
        .map(str::to_string)
        .collect();
    databases.sort();
    databases
}

/// Policies from `SHOW RETENTION POLICIES ON <db>`, sorted by name.
pub fn parse_retention_policies(database: &str, result: &QueryResult) -> Vec<RetentionPolicy> {
    let Some((series, [name, duration, default])) = result.table(["name", "duration", "default"])
    else {
        return Vec::new();
    };
    let mut policies: Vec<RetentionPolicy> = series
        .values
        .iter()
        .filter_map(|row| {
            let policy_name = cell_str(row, name)?;
            Some(RetentionPolicy::new(
                database,
                policy_name,
                cell_str(row, duration).map(parse_duration).unwrap_or(0),
                cell_true(row, default),
            ))
        })
        .collect();
    policies.sort_by(|a, b| a.policy_name.cmp(&b.policy_name));
    policies
}

/// Users from `SHOW USERS`, sorted by name, without grants.
pub fn parse_users(result: &QueryResult) -> Vec<User> {
    let Some((series, [user, admin])) = result.table(["user", "admin"]) else {
        return Vec::new();
    };
    let mut users: Vec<User> = series
        .values
        .iter()
        .filter_map(|row| {
            let name = cell_str(row, user)?;
            Some(User {
                is_admin: cell_true(row, admin),
                ..User::new(name)
            })
        })
        .collect();
    users.sort_by(|a, b| a.name.cmp(&b.name));
    users
}

/// Fill the user's grants from `SHOW GRANTS FOR <user>`.
///
/// `READ`, `WRITE` and `ALL PRIVILEGES` are recognised; anything else,
/// including `NO PRIVILEGES`, grants nothing.
pub fn apply_grants(user: &mut User, result: &QueryResult) {
    let Some((series, [database, privilege])) = result.table(["database", "privilege"]) else {
        return;
    };
    for row in &series.values {
        let (Some(db), Some(privilege)) = (cell_str(row, database), cell_str(row, privilege))
        else {
            continue;
        };
        if privilege.starts_with("READ") {
            user.read_databases.insert(db.to_string());
        } else if privilege.starts_with("WRITE") {
            user.write_databases.insert(db.to_string());
        } else if privilege.starts_with("ALL") {
            user.read_databases.insert(db.to_string());
            user.write_databases.insert(db.to_string());
        }
    }
}

/// HTTP client for a live v1 server.
#[derive(Clone)]
pub struct V1Client {
    client: Client,
    base_url: String,
    user: String,
    password: String,
}

impl V1Client {
    pub fn new(config: &SourceConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    /// Run one InfluxQL statement and return its single result.
    pub async fn query(&self, command: &str) -> ApiResult<QueryResult> {
        let mut request = self
            .client
            .get(format!("{}/query", self.base_url))
            .query(&[("q", command)]);
        if !self.user.is_empty() && !self.password.is_empty() {
            request = request.basic_auth(&self.user, Some(&self.password));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::status("GET", "/query", status.as_u16(), body));
        }

        let body: QueryResponse = response.json().await?;
        if let Some(message) = body.error {
            return Err(ApiError::Query {
                command: command.to_string(),
                message,
            });
        }
        let result = body
            .results
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| ApiError::Query {
                command: command.to_string(),
                message: "response contains no results".into(),
            })?;
        if let Some(message) = result.error {
            return Err(ApiError::Query {
                command: command.to_string(),
                message,
            });
        }
        Ok(result)
    }
}

impl SourceApi for V1Client {
    async fn fetch_retention_policies(&self) -> ApiResult<Vec<RetentionPolicy>> {
        let databases = parse_databases(&self.query("SHOW DATABASES").await?);
        let mut policies = Vec::new();
        for db in databases {
            let command = format!("SHOW RETENTION POLICIES ON {}", quote_ident(&db));
            match self.query(&command).await {
                Ok(result) => {
                    let found = parse_retention_policies(&db, &result);
                    trace!(database = %db, ?found, "retention policies");
                    policies.extend(found);
                }
                Err(err) => warn!(
                    database = %db,
                    error = %err,
                    "Ignoring database since its retention policies cannot be retrieved"
                ),
            }
        }
        Ok(policies)
    }

    async fn fetch_users(&self) -> ApiResult<Vec<User>> {
        let mut users = parse_users(&self.query("SHOW USERS").await?);
        for user in &mut users {
            let command = format!("SHOW GRANTS FOR {}", quote_ident(&user.name));
            match self.query(&command).await {
                Ok(result) => apply_grants(user, &result),
                Err(err) => warn!(
                    user = %user.name,
                    error = %err,
                    "Ignoring grants for user, they cannot be retrieved"
                ),
            }
        }
        trace!(?users, "source users");
        Ok(users)
    }
}
