//! Object storage connection for field data (MinIO/S3 compatible, or a
//! local directory).

use object_store::{aws::AmazonS3Builder, local::LocalFileSystem, ObjectStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use wx_common::{WxError, WxResult};

/// Configuration for object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// S3/MinIO endpoint URL
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// AWS region (use "us-east-1" for MinIO)
    pub region: String,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
    /// Store under this directory instead of S3
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://minio:9000".to_string(),
            bucket: "wx-fields".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            allow_http: true,
            local_path: None,
        }
    }
}

/// Build the configured store.
pub fn build_object_store(config: &ObjectStorageConfig) -> WxResult<Arc<dyn ObjectStore>> {
    if let Some(path) = &config.local_path {
        std::fs::create_dir_all(path)?;
        let store = LocalFileSystem::new_with_prefix(path).map_err(|e| {
            WxError::StorageError(format!(
                "Failed to open local store {}: {}",
                path.display(),
                e
            ))
        })?;
        info!(path = %path.display(), "Using local field store");
        return Ok(Arc::new(store));
    }

    let mut builder = AmazonS3Builder::new()
        .with_endpoint(&config.endpoint)
        .with_bucket_name(&config.bucket)
        .with_access_key_id(&config.access_key_id)
        .with_secret_access_key(&config.secret_access_key)
        .with_region(&config.region);

    if config.allow_http {
        builder = builder.with_allow_http(true);
    }

    let store = builder
        .build()
        .map_err(|e| WxError::StorageError(format!("Failed to create S3 client: {}", e)))?;

    info!(endpoint = %config.endpoint, bucket = %config.bucket, "Using S3 field store");
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = ObjectStorageConfig {
            local_path: Some(dir.path().join("fields")),
            ..Default::default()
        };
        build_object_store(&config).unwrap();
        assert!(dir.path().join("fields").is_dir());
    }
}
