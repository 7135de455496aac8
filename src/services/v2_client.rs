//! HTTP client for the v2 target: organizations, buckets, DBRP mappings and
//! legacy authorizations.

use crate::{
    config::TargetConfig,
    errors::{ApiError, ApiResult},
    models::{
        authorization::{LegacyAuthorization, NewLegacyAuthorization},
        bucket::{Bucket, DbrpMapping, NewBucket, NewDbrpMapping},
    },
    services::target::TargetApi,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::trace;

const ORGS_PATH: &str = "/api/v2/orgs";
const BUCKETS_PATH: &str = "/api/v2/buckets";
const DBRPS_PATH: &str = "/api/v2/dbrps";
const LEGACY_AUTHORIZATIONS_PATH: &str = "/private/legacy/authorizations";

/// Largest page the bucket listing accepts.
const BUCKET_PAGE_SIZE: usize = 100;

#[derive(Deserialize)]
struct Organization {
    id: String,
}

#[derive(Deserialize)]
struct Organizations {
    #[serde(default)]
    orgs: Vec<Organization>,
}

#[derive(Deserialize)]
struct Buckets {
    #[serde(default)]
    buckets: Vec<Bucket>,
}

#[derive(Deserialize)]
struct Dbrps {
    // older servers put the list under a mislabelled key
    #[serde(default, alias = "notificationEndpoints")]
    content: Vec<DbrpMapping>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CreatedDbrp {
    Wrapped { content: DbrpMapping },
    Plain(DbrpMapping),
}

#[derive(Deserialize)]
struct LegacyAuthorizations {
    #[serde(default)]
    authorizations: Vec<LegacyAuthorization>,
}

#[derive(Serialize)]
struct PasswordBody<'a> {
    password: &'a str,
}

/// Client for a live v2 server, authenticated with an API token.
#[derive(Clone)]
pub struct V2Client {
    client: Client,
    base_url: String,
    token: String,
}

impl V2Client {
    pub fn new(config: &TargetConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into an error carrying the body text.
    async fn check(method: &'static str, path: &str, response: Response) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::status(method, path, status.as_u16(), body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ApiResult<T> {
        let response = self
            .request(self.client.get(self.url(path)).query(query))
            .send()
            .await?;
        Ok(Self::check("GET", path, response).await?.json().await?)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let response = self
            .request(self.client.post(self.url(path)).json(body))
            .send()
            .await?;
        Ok(Self::check("POST", path, response).await?.json().await?)
    }

    async fn delete(&self, path: &str) -> ApiResult<()> {
        let response = self
            .request(self.client.delete(self.url(path)))
            .send()
            .await?;
        Self::check("DELETE", path, response).await?;
        Ok(())
    }
}

impl TargetApi for V2Client {
    async fn resolve_org_id(&self, org_name: &str) -> ApiResult<String> {
        let response = self
            .request(self.client.get(self.url(ORGS_PATH)).query(&[("org", org_name)]))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::OrgNotFound(org_name.to_string()));
        }
        let orgs: Organizations = Self::check("GET", ORGS_PATH, response).await?.json().await?;
        let org = orgs
            .orgs
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::OrgNotFound(org_name.to_string()))?;
        trace!(org = org_name, id = %org.id, "resolved organization");
        Ok(org.id)
    }

    async fn fetch_buckets(&self, org_id: &str) -> ApiResult<Vec<Bucket>> {
        let limit = BUCKET_PAGE_SIZE.to_string();
        let mut all = Vec::new();
        loop {
            let offset = all.len().to_string();
            let page: Buckets = self
                .get_json(
                    BUCKETS_PATH,
                    &[("orgID", org_id), ("limit", limit.as_str()), ("offset", offset.as_str())],
                )
                .await?;
            let fetched = page.buckets.len();
            all.extend(page.buckets);
            if fetched < BUCKET_PAGE_SIZE {
                break;
            }
        }
        trace!(buckets = ?all, "target buckets");
        Ok(all)
    }

    async fn fetch_mappings(&self, org_id: &str) -> ApiResult<Vec<DbrpMapping>> {
        let dbrps: Dbrps = self.get_json(DBRPS_PATH, &[("orgID", org_id)]).await?;
        trace!(mappings = ?dbrps.content, "target DBRP mappings");
        Ok(dbrps.content)
    }

    async fn fetch_authorizations(&self, org_id: &str) -> ApiResult<Vec<LegacyAuthorization>> {
        let auths: LegacyAuthorizations = self
            .get_json(LEGACY_AUTHORIZATIONS_PATH, &[("orgID", org_id)])
            .await?;
        trace!(count = auths.authorizations.len(), "target legacy authorizations");
        Ok(auths.authorizations)
    }

    async fn create_bucket(&self, bucket: &NewBucket) -> ApiResult<Bucket> {
        self.post_json(BUCKETS_PATH, bucket).await
    }

    async fn create_mapping(&self, mapping: &NewDbrpMapping) -> ApiResult<DbrpMapping> {
        let created: CreatedDbrp = self.post_json(DBRPS_PATH, mapping).await?;
        Ok(match created {
            CreatedDbrp::Wrapped { content } => content,
            CreatedDbrp::Plain(mapping) => mapping,
        })
    }

    async fn delete_bucket(&self, bucket_id: &str) -> ApiResult<()> {
        self.delete(&format!("{BUCKETS_PATH}/{bucket_id}")).await
    }

    async fn create_authorization(
        &self,
        authorization: &NewLegacyAuthorization,
    ) -> ApiResult<LegacyAuthorization> {
        self.post_json(LEGACY_AUTHORIZATIONS_PATH, authorization).await
    }

    async fn delete_authorization(&self, authorization_id: &str) -> ApiResult<()> {
        self.delete(&format!("{LEGACY_AUTHORIZATIONS_PATH}/{authorization_id}"))
            .await
    }

    async fn set_password(&self, authorization_id: &str, password: &str) -> ApiResult<()> {
        let path = format!("{LEGACY_AUTHORIZATIONS_PATH}/{authorization_id}/password");
        let response = self
            .request(self.client.post(self.url(&path)).json(&PasswordBody { password }))
            .send()
            .await?;
        Self::check("POST", &path, response).await?;
        Ok(())
    }
}
