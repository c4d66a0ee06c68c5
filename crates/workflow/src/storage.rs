//! Object storage backends: local filesystem and S3.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use wayfinder_core::error::CoreError;
use wayfinder_core::storage::{public_object_url, StorageBackendType};

use crate::config::StorageConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::ports::ObjectStorage;

// ---------------------------------------------------------------------------
// Local filesystem
// ---------------------------------------------------------------------------

/// Writes objects to `{root}/{bucket}/{key}` and serves them from
/// `{public_base_url}/{bucket}/{key}`.
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> WorkflowResult<PathBuf> {
        let relative = Path::new(bucket).join(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(WorkflowError::Storage(format!(
                "refusing object key outside the storage root: {bucket}/{key}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> WorkflowResult<String> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WorkflowError::Storage(format!("{}: {e}", parent.display())))?;
        }
        let size = data.len();
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| WorkflowError::Storage(format!("{}: {e}", path.display())))?;

        tracing::debug!(bucket, key, content_type, size, "Stored object on local filesystem");
        Ok(public_object_url(&self.public_base_url, bucket, key))
    }
}

// ---------------------------------------------------------------------------
// S3
// ---------------------------------------------------------------------------

/// Uploads with `PutObject`. Credentials and region come from the standard
/// AWS provider chain.
pub struct S3ObjectStorage {
    client: aws_sdk_s3::Client,
    public_base_url: String,
}

impl S3ObjectStorage {
    pub fn new(client: aws_sdk_s3::Client, public_base_url: impl Into<String>) -> Self {
        Self {
            client,
            public_base_url: public_base_url.into(),
        }
    }

    /// Build a client from the environment.
    pub async fn from_env(public_base_url: impl Into<String>) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_s3::Client::new(&sdk_config), public_base_url)
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> WorkflowResult<String> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                WorkflowError::Storage(format!(
                    "S3 upload to {bucket}/{key} failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        tracing::debug!(bucket, key, content_type, size, "Stored object in S3");
        Ok(public_object_url(&self.public_base_url, bucket, key))
    }
}

/// Build the backend selected by `config`.
pub async fn build_object_storage(config: &StorageConfig) -> Result<Arc<dyn ObjectStorage>, CoreError> {
    let base_url = config.public_base_url.clone().unwrap_or_default();
    match config.backend {
        StorageBackendType::Local => {
            let root = config.local_root.clone().ok_or_else(|| {
                CoreError::invalid("STORAGE_LOCAL_ROOT is required for the local storage backend")
            })?;
            Ok(Arc::new(LocalObjectStorage::new(root, base_url)))
        }
        StorageBackendType::S3 => Ok(Arc::new(S3ObjectStorage::from_env(base_url).await)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_upload_writes_file_and_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "http://localhost:8080/media/");

        let url = storage
            .upload(
                "destination-media",
                "change-requests/4/hero/abc.png",
                "image/png",
                vec![1, 2, 3],
            )
            .await
            .unwrap();

        assert_eq!(
            url,
            "http://localhost:8080/media/destination-media/change-requests/4/hero/abc.png"
        );
        let written = std::fs::read(
            dir.path()
                .join("destination-media/change-requests/4/hero/abc.png"),
        )
        .unwrap();
        assert_eq!(written, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn local_upload_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "http://localhost");
        let err = storage
            .upload("bucket", "../escape.txt", "text/plain", vec![0])
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Storage(_)));
    }
}
