//! The capabilities the migrator needs from a v2 target.

use crate::{
    errors::ApiResult,
    models::{
        authorization::{LegacyAuthorization, NewLegacyAuthorization},
        bucket::{Bucket, DbrpMapping, NewBucket, NewDbrpMapping},
    },
};

/// Reads and writes against a v2 target.
///
/// Implemented by the HTTP client and by the in-memory target used for dry
/// runs. Every call either succeeds or fails once; there is no retrying.
pub trait TargetApi {
    fn resolve_org_id(&self, org_name: &str) -> impl Future<Output = ApiResult<String>> + Send;

    fn fetch_buckets(&self, org_id: &str) -> impl Future<Output = ApiResult<Vec<Bucket>>> + Send;

    fn fetch_mappings(
        &self,
        org_id: &str,
    ) -> impl Future<Output = ApiResult<Vec<DbrpMapping>>> + Send;

    fn fetch_authorizations(
        &self,
        org_id: &str,
    ) -> impl Future<Output = ApiResult<Vec<LegacyAuthorization>>> + Send;

    fn create_bucket(&self, bucket: &NewBucket) -> impl Future<Output = ApiResult<Bucket>> + Send;

    fn create_mapping(
        &self,
        mapping: &NewDbrpMapping,
    ) -> impl Future<Output = ApiResult<DbrpMapping>> + Send;

    fn delete_bucket(&self, bucket_id: &str) -> impl Future<Output = ApiResult<()>> + Send;

    fn create_authorization(
        &self,
        authorization: &NewLegacyAuthorization,
    ) -> impl Future<Output = ApiResult<LegacyAuthorization>> + Send;

    fn delete_authorization(
        &self,
        authorization_id: &str,
    ) -> impl Future<Output = ApiResult<()>> + Send;

    fn set_password(
        &self,
        authorization_id: &str,
        password: &str,
    ) -> impl Future<Output = ApiResult<()>> + Send;
}
