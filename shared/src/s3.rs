use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, PublicAccessBlockConfiguration,
};
use aws_sdk_s3::Client as S3Client;

use crate::config::Config;
use crate::error::{ApiError, ApiResult};

/// Object storage for user photos
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Upload a photo and return the URL it can be fetched from
    async fn store(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ApiResult<String>;

    /// Delete the object behind `url`. Callers treat failures as
    /// best-effort: log them and carry on.
    async fn remove(&self, url: &str) -> ApiResult<()>;

    /// Whether the object behind `url` is present; errors read as `false`
    async fn exists(&self, url: &str) -> bool;
}

/// S3 bucket holding user photos, publicly readable
pub struct PhotoBucket {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl PhotoBucket {
    pub fn new(client: S3Client, config: &Config) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            public_base_url: config.photo_base_url.clone(),
        }
    }

    /// Create the bucket if it is not there yet and open its objects to
    /// anonymous reads. An existing bucket is used as is; it must already be
    /// readable at `public_base_url` (bucket policy or CDN in front).
    async fn ensure_bucket(&self) -> ApiResult<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }

        let mut request = self
            .client
            .create_bucket()
            .bucket(&self.bucket);

        // us-east-1 is the only region that rejects an explicit constraint
        if let Some(region) = self.client.config().region() {
            if region.as_ref() != "us-east-1" {
                request = request.create_bucket_configuration(
                    CreateBucketConfiguration::builder()
                        .location_constraint(BucketLocationConstraint::from(region.as_ref()))
                        .build(),
                );
            }
        }

        if let Err(e) = request.send().await {
            let service_error = e.into_service_error();
            if service_error.is_bucket_already_owned_by_you() {
                return Ok(());
            }
            return Err(ApiError::Storage(format!(
                "Failed to create bucket {}: {}",
                self.bucket, service_error
            )));
        }
        tracing::info!("🪣 Created bucket {}", self.bucket);

        self.allow_public_reads().await
    }

    /// Lift the default public access block and attach a `GetObject` policy
    /// for everyone, so returned photo URLs work without credentials
    async fn allow_public_reads(&self) -> ApiResult<()> {
        // Emulators such as MinIO do not implement this call
        if let Err(e) = self
            .client
            .put_public_access_block()
            .bucket(&self.bucket)
            .public_access_block_configuration(
                PublicAccessBlockConfiguration::builder()
                    .block_public_acls(true)
                    .ignore_public_acls(true)
                    .block_public_policy(false)
                    .restrict_public_buckets(false)
                    .build(),
            )
            .send()
            .await
        {
            tracing::warn!(
                "⚠️ Could not relax public access block on {}: {}",
                self.bucket,
                e.into_service_error()
            );
        }

        self.client
            .put_bucket_policy()
            .bucket(&self.bucket)
            .policy(public_read_policy(&self.bucket))
            .send()
            .await
            .map_err(|e| {
                ApiError::Storage(format!(
                    "Failed to make bucket {} public: {}",
                    self.bucket,
                    e.into_service_error()
                ))
            })?;

        tracing::info!("🌐 Bucket {} is publicly readable", self.bucket);
        Ok(())
    }
}

#[async_trait]
impl PhotoStore for PhotoBucket {
    async fn store(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ApiResult<String> {
        self.ensure_bucket().await?;

        let key = object_key(chrono::Utc::now().timestamp_millis(), file_name);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Error uploading photo: {}", e);
                ApiError::Storage(format!("Failed to upload photo: {}", e))
            })?;

        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn remove(&self, url: &str) -> ApiResult<()> {
        let Some(key) = key_from_url(url) else {
            return Ok(());
        };

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("Failed to delete photo {}: {}", key, e)))?;

        tracing::info!("🗑️ Photo deleted: {}", key);
        Ok(())
    }

    async fn exists(&self, url: &str) -> bool {
        let Some(key) = key_from_url(url) else {
            return false;
        };

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                let service_error = e.into_service_error();
                if !service_error.is_not_found() {
                    tracing::error!("Error checking photo existence: {}", service_error);
                }
                false
            }
        }
    }
}

/// `{millis}-{name}`, with the client's file name reduced to a safe
/// single path segment
pub fn object_key(timestamp_millis: i64, file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized
    };

    format!("{}-{}", timestamp_millis, sanitized)
}

/// Bucket policy granting anonymous `s3:GetObject` on every object
pub fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "PublicReadGetObject",
            "Effect": "Allow",
            "Principal": "*",
            "Action": "s3:GetObject",
            "Resource": format!("arn:aws:s3:::{}/*", bucket),
        }],
    })
    .to_string()
}

/// Object key is the last path segment of the photo URL
pub fn key_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/').next().filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::retry::RetryConfig;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

    #[test]
    fn test_object_key_prefixes_timestamp() {
        assert_eq!(object_key(1700000000123, "me.png"), "1700000000123-me.png");
    }

    #[test]
    fn test_object_key_sanitizes_names() {
        assert_eq!(object_key(1, "../../etc/passwd"), "1-passwd");
        assert_eq!(object_key(1, "C:\\photos\\holiday pic.jpg"), "1-holiday_pic.jpg");
        assert_eq!(object_key(1, "café?.webp"), "1-caf__.webp");
        assert_eq!(object_key(1, ""), "1-upload");
        assert_eq!(object_key(1, "dir/"), "1-upload");
    }

    /// Client pointed at a closed local port: every S3 call fails fast
    fn unreachable_bucket() -> PhotoBucket {
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "static"))
            .endpoint_url("http://127.0.0.1:1")
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .build();
        let config = Config::from_lookup(|_| None).unwrap();
        PhotoBucket::new(S3Client::from_conf(s3_config), &config)
    }

    #[test]
    fn test_public_read_policy() {
        let policy: serde_json::Value =
            serde_json::from_str(&public_read_policy("user-photos")).unwrap();
        let statement = &policy["Statement"][0];

        assert_eq!(policy["Version"], "2012-10-17");
        assert_eq!(statement["Effect"], "Allow");
        assert_eq!(statement["Principal"], "*");
        assert_eq!(statement["Action"], "s3:GetObject");
        assert_eq!(statement["Resource"], "arn:aws:s3:::user-photos/*");
    }

    #[tokio::test]
    async fn test_remove_without_key_is_noop() {
        let bucket = unreachable_bucket();
        assert!(bucket.remove("").await.is_ok());
        assert!(bucket.remove("https://host/bucket/").await.is_ok());
    }

    #[tokio::test]
    async fn test_gateway_errors() {
        let bucket = unreachable_bucket();
        let url = "https://user-photos.s3.amazonaws.com/1700-me.png";

        assert!(!bucket.exists(url).await);
        assert!(!bucket.exists("").await);
        assert!(matches!(bucket.remove(url).await, Err(ApiError::Storage(_))));
        assert!(matches!(
            bucket.store("me.png", b"png".to_vec(), "image/png").await,
            Err(ApiError::Storage(_))
        ));
    }

    #[test]
    fn test_key_from_url() {
        assert_eq!(
            key_from_url("https://user-photos.s3.amazonaws.com/1700-me.png"),
            Some("1700-me.png")
        );
        assert_eq!(
            key_from_url("http://localhost:9000/user-photos/1700-me.png?x-id=1"),
            Some("1700-me.png")
        );
        assert_eq!(key_from_url(""), None);
        assert_eq!(key_from_url("https://host/bucket/"), None);
    }
}
