use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::config::S3Config;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store request failed: {0}")]
    ObjectStore(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),
}

// 1. StorageService Contract
/// StorageService
///
/// The contract for persisting uploaded vehicle images. Handlers only see this
/// trait, so the local-disk store, the S3 client and the test mock are interchangeable.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Prepares the backing store at startup (creates the upload directory or bucket).
    async fn ensure_ready(&self) -> Result<(), StorageError>;

    /// Stores `bytes` under `key` and returns the public URL of the stored object.
    ///
    /// # Arguments
    /// * `key`: Object key, `{userId}/{uuid}.{ext}`.
    /// * `content_type`: The already-validated MIME type.
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError>;
}

/// sanitize_key
///
/// Strips directory navigation components (`..`, `.`, empty segments) from an
/// object key so it can never escape the upload root.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn checked_key(key: &str) -> Result<String, StorageError> {
    let clean = sanitize_key(key);
    if clean.is_empty() {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(clean)
}

// 2. Local Disk Implementation
/// LocalDiskStorage
///
/// Writes uploads under `UPLOAD_DIRECTORY`. The router serves that directory at
/// `/uploads`, so the returned URL is `{public_url}/uploads/{key}`.
#[derive(Clone)]
pub struct LocalDiskStorage {
    root: PathBuf,
    public_url: String,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        _content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let key = checked_key(key)?;
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), "stored upload on local disk");
        Ok(format!("{}/uploads/{}", self.public_url, key))
    }
}

// 3. The S3-compatible Implementation
/// S3StorageClient
///
/// Uploads through the AWS SDK to any S3-compatible endpoint (AWS, MinIO,
/// Supabase Storage). `force_path_style(true)` keeps MinIO and gateway
/// endpoints working.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
    public_url: String,
}

impl S3StorageClient {
    pub fn new(config: &S3Config) -> Self {
        let credentials = s3::config::Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "static",
        );

        let s3_config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(&config.endpoint)
            .region(s3::config::Region::new(config.region.clone()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(s3_config),
            bucket_name: config.bucket.clone(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// CreateBucket is idempotent; an "already owned" error is expected on every
    /// start after the first.
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket skipped");
        }
        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        let key = checked_key(key)?;
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::ObjectStore(e.to_string()))?;

        Ok(format!("{}/{}", self.public_url, key))
    }
}

// 4. The Mock Implementation (For Unit Tests)
/// MockStorageService
///
/// Accepts every upload without touching disk or network and returns a
/// deterministic URL, or fails every call when built with `new_failing`.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_ready(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put_object(
        &self,
        key: &str,
        _content_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::ObjectStore(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}",
            checked_key(key)?
        ))
    }
}

/// StorageState
///
/// The shared handle to the storage service held in `AppState`.
pub type StorageState = Arc<dyn StorageService>;
