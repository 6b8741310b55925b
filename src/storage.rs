use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::{operation::create_bucket::CreateBucketError, primitives::ByteStream};
use std::sync::{Arc, Mutex};

/// StorageError
///
/// Failure of the object store. The message is the SDK's, kept for the logs.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StorageError(pub String);

// 1. StorageService Contract
/// StorageService
///
/// Defines the abstract contract for all interactions with the object storage layer.
/// Swapping the real S3 client (`S3StorageClient`) for the in-memory mock
/// (`MockStorageService`) requires no change in the calling handlers.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Used in `Env::Local` to provision the
    /// MinIO bucket at startup.
    async fn ensure_bucket_exists(&self);

    /// Stores `bytes` under `key` and returns the key actually written, after path
    /// sanitization.
    ///
    /// # Arguments
    /// * `key`: The object key (path + filename) in the bucket.
    /// * `content_type`: The MIME type recorded on the object (e.g., "image/png").
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError>;

    /// Removes the object stored under `key`, as returned by `put_object`. Deleting a
    /// missing key is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;
}

// 2. The Real Implementation (S3/MinIO)
/// S3StorageClient
///
/// The concrete implementation using the AWS SDK for S3. `force_path_style(true)` is
/// required for MinIO-style endpoints.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    /// new
    ///
    /// Constructs the S3 client using credentials and configuration from AppConfig.
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// ensure_bucket_exists
    ///
    /// A bucket that already exists is only noted at debug level. Any other
    /// CreateBucket failure is logged as a warning and startup continues.
    async fn ensure_bucket_exists(&self) {
        match self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            Ok(_) => tracing::info!("created bucket {}", self.bucket_name),
            Err(e) => match e.as_service_error() {
                Some(service_error) if is_bucket_already_present(service_error) => {
                    tracing::debug!("bucket {} already exists", self.bucket_name);
                }
                _ => tracing::warn!("create_bucket {} failed: {:?}", self.bucket_name, e),
            },
        }
    }

    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let key = sanitize_key(key);
        if key.is_empty() {
            return Err(StorageError("object key is empty after sanitization".into()));
        }

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError(format!("put_object {}: {}", key, e)))?;

        Ok(key)
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError(format!("delete_object {}: {}", key, e)))?;

        Ok(())
    }
}

/// True for the CreateBucket errors that mean the bucket is already there.
pub fn is_bucket_already_present(err: &CreateBucketError) -> bool {
    err.is_bucket_already_owned_by_you() || err.is_bucket_already_exists()
}

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`) and empty segments from a key
/// so that a crafted filename cannot escape its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 3. The Mock Implementation (For Tests)
/// MockStorageService
///
/// Accepts every upload without network access, or fails every operation when built
/// with `new_failing()`. Stored and deleted keys are recorded; clones share the record.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    stored: Arc<Mutex<Vec<String>>>,
    deleted: Arc<Mutex<Vec<String>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Keys currently held, in upload order.
    pub fn stored_keys(&self) -> Vec<String> {
        self.stored.lock().map(|keys| keys.clone()).unwrap_or_default()
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().map(|keys| keys.clone()).unwrap_or_default()
    }

    fn simulated_failure() -> StorageError {
        StorageError("Mock Storage Error: Simulation requested".to_string())
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {
        // No-op in mock environment.
    }

    async fn put_object(
        &self,
        key: &str,
        _content_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(Self::simulated_failure());
        }

        let key = sanitize_key(key);
        if let Ok(mut stored) = self.stored.lock() {
            stored.push(key.clone());
        }
        Ok(key)
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(Self::simulated_failure());
        }

        if let Ok(mut stored) = self.stored.lock() {
            stored.retain(|k| k != key);
        }
        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(key.to_string());
        }
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;
