//! S3 backend implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectBackend trait from bfs-core.

use std::time::Duration;

use async_trait::async_trait;
use aws_smithy_types::DateTime;
use jiff::Timestamp;

use bfs_core::{
    AdapterConfig, BackendError, BackendResult, GetOutput, Listing, ObjectBackend, ObjectFs,
    ObjectMeta, ObjectSummary, PutOutput, Result,
};

use crate::error::from_sdk_error;

/// Filesystem adapter backed by S3
pub type S3FileSystem = ObjectFs<S3Backend>;

/// Build an S3-backed filesystem adapter from `config`
pub async fn connect(config: &AdapterConfig) -> Result<S3FileSystem> {
    let backend = S3Backend::new(config).await?;
    Ok(ObjectFs::new(backend, config))
}

/// S3 client bound to one bucket
pub struct S3Backend {
    inner: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Backend {
    /// Create a new backend from an adapter configuration
    ///
    /// Without static credentials the SDK's default provider chain is used
    /// (environment, profile, instance metadata).
    pub async fn new(config: &AdapterConfig) -> Result<Self> {
        config.validate()?;

        let retry = config.retry_config();
        let timeout = config.timeout_config();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .retry_config(
                aws_smithy_types::retry::RetryConfig::standard()
                    .with_max_attempts(retry.max_attempts)
                    .with_initial_backoff(Duration::from_millis(retry.initial_backoff_ms))
                    .with_max_backoff(Duration::from_millis(retry.max_backoff_ms)),
            )
            .timeout_config(
                aws_smithy_types::timeout::TimeoutConfig::builder()
                    .connect_timeout(Duration::from_millis(timeout.connect_ms))
                    .read_timeout(Duration::from_millis(timeout.read_ms))
                    .build(),
            );

        if let Some((access_key, secret_key)) = config.static_credentials() {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                config.session_token.clone(),
                None,
                "bfs-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::info!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            path_style = config.force_path_style,
            "S3 backend ready"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    /// Bucket this backend operates on
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn to_timestamp(value: &DateTime) -> Option<Timestamp> {
    Timestamp::new(value.secs(), value.subsec_nanos() as i32).ok()
}

fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

fn to_size(length: Option<i64>) -> Option<u64> {
    length.and_then(|n| u64::try_from(n).ok())
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn get(&self, key: &str) -> BackendResult<GetOutput> {
        let response = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(from_sdk_error)?;

        let meta = ObjectMeta {
            size: to_size(response.content_length()),
            last_modified: response.last_modified().and_then(to_timestamp),
            etag: response.e_tag().map(trim_etag),
            content_type: response.content_type().map(str::to_string),
        };

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| BackendError::other(format!("failed to read body of '{key}': {e}")))?
            .into_bytes()
            .to_vec();

        Ok(GetOutput { body, meta })
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> BackendResult<PutOutput> {
        let response = self
            .inner
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(aws_sdk_s3::primitives::ByteStream::from(body))
            .send()
            .await
            .map_err(from_sdk_error)?;

        Ok(PutOutput {
            etag: response.e_tag().map(trim_etag),
        })
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        self.inner
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(from_sdk_error)?;

        Ok(())
    }

    async fn head(&self, key: &str) -> BackendResult<ObjectMeta> {
        let response = self
            .inner
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(from_sdk_error)?;

        Ok(ObjectMeta {
            size: to_size(response.content_length()),
            last_modified: response.last_modified().and_then(to_timestamp),
            etag: response.e_tag().map(trim_etag),
            content_type: response.content_type().map(str::to_string),
        })
    }

    async fn list(&self, prefix: &str, delimiter: Option<char>) -> BackendResult<Listing> {
        let mut listing = Listing::default();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .inner
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(d) = delimiter {
                request = request.delimiter(d.to_string());
            }

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(from_sdk_error)?;

            for common in response.common_prefixes() {
                if let Some(p) = common.prefix() {
                    listing.common_prefixes.push(p.to_string());
                }
            }

            for object in response.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                listing.objects.push(ObjectSummary {
                    key: key.to_string(),
                    size: to_size(object.size()).unwrap_or(0),
                    last_modified: object.last_modified().and_then(to_timestamp),
                    etag: object.e_tag().map(trim_etag),
                });
            }

            match response.next_continuation_token() {
                Some(next) if response.is_truncated().unwrap_or(false) => {
                    tracing::debug!(prefix, fetched = listing.objects.len(), "listing next page");
                    continuation_token = Some(next.to_string());
                }
                _ => break,
            }
        }

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_etag() {
        assert_eq!(trim_etag("\"d41d8cd98f00b204e9800998ecf8427e\""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(trim_etag("plain"), "plain");
    }

    #[test]
    fn test_to_timestamp() {
        let dt = DateTime::from_secs_and_nanos(1_700_000_000, 500);
        let ts = to_timestamp(&dt).unwrap();
        assert_eq!(ts.as_second(), 1_700_000_000);
        assert_eq!(ts.subsec_nanosecond(), 500);
    }

    #[test]
    fn test_to_size() {
        assert_eq!(to_size(Some(42)), Some(42));
        assert_eq!(to_size(Some(-1)), None);
        assert_eq!(to_size(None), None);
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = AdapterConfig::new("us-east-1", "");
        assert!(S3Backend::new(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_connect_builds_adapter() {
        let config = AdapterConfig::new("us-east-1", "assets")
            .with_endpoint("http://localhost:9000")
            .with_credentials("accesskey", "secretkey")
            .with_prefix("myapp")
            .with_path_style(true);

        let fs = connect(&config).await.unwrap();
        assert_eq!(fs.backend().bucket(), "assets");
        assert_eq!(fs.bucket_info().prefix, "myapp");
        assert_eq!(fs.key_for("/a//b.txt"), "myapp/a/b.txt");
    }
}
