//! S3-backed blob store.

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;
use url::Url;

use super::{join_public_url, validate_object_path, BlobStore, PutObjectOutput};
use crate::error::StoreError;

/// Cache-Control header sent with every upload (one hour).
pub const DEFAULT_CACHE_CONTROL: &str = "max-age=3600";

/// S3-backed implementation of [`BlobStore`].
///
/// Writes objects to a bucket in S3 or an S3-compatible service (MinIO,
/// Supabase Storage S3 endpoint, etc.). Uploads are conditional on the key
/// not existing (`If-None-Match: *`), so an existing object is never
/// replaced.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    prefix: Option<String>,
    public_base: Url,
    cache_control: String,
    identifier: String,
}

impl S3BlobStore {
    /// Create a store writing to `bucket`, serving objects under `public_base`.
    pub fn new(client: Client, bucket: String, public_base: Url) -> Self {
        let identifier = format!("s3://{}", bucket);
        Self {
            client,
            bucket,
            prefix: None,
            public_base,
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            identifier,
        }
    }

    /// Place every object under `prefix/` inside the bucket.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    /// Override the Cache-Control header sent with uploads.
    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = cache_control.into();
        self
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key for a caller-supplied path.
    pub fn resolve_key(&self, path: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, path),
            None => path.to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_object(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<PutObjectOutput, StoreError> {
        validate_object_path(path)?;

        let key = self.resolve_key(path);
        debug!(bucket = %self.bucket, key = %key, bytes = data.len(), "PutObject");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .cache_control(&self.cache_control)
            .if_none_match("*")
            .send()
            .await
            .map_err(|e| {
                if matches!(e, SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)) {
                    return StoreError::Connection(e.to_string());
                }

                let status = e.raw_response().map(|r| r.status().as_u16());
                match status {
                    // 412 for If-None-Match, 409 for a concurrent conditional write
                    Some(412) | Some(409) => {
                        StoreError::Conflict(format!("s3://{}/{}", self.bucket, key))
                    }
                    Some(403) => StoreError::PermissionDenied(format!(
                        "s3://{}/{}: {}",
                        self.bucket, key, e
                    )),
                    _ => StoreError::S3(e.to_string()),
                }
            })?;

        Ok(PutObjectOutput { resolved_path: key })
    }

    fn public_url(&self, resolved_path: &str) -> String {
        join_public_url(&self.public_base, resolved_path)
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Public URL base for objects in `bucket` when none is configured.
///
/// Custom endpoints use path-style addressing (`{endpoint}/{bucket}`); AWS
/// uses the virtual-hosted bucket domain.
pub fn default_public_base(
    endpoint_url: Option<&str>,
    bucket: &str,
    region: &str,
) -> Result<Url, url::ParseError> {
    match endpoint_url {
        Some(endpoint) => Url::parse(&format!(
            "{}/{}",
            endpoint.trim_end_matches('/'),
            bucket
        )),
        None => Url::parse(&format!("https://{}.s3.{}.amazonaws.com", bucket, region)),
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services generally need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
