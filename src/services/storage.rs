use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::models::evaluation::StorageKind;

/// URL prefix under which local uploads are served.
pub const LOCAL_URL_PREFIX: &str = "/api/files";

/// Read access to stored images.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// A reference the image can be fetched from.
    async fn get_url(&self, path: &str) -> Result<String, StorageError>;

    /// Raw image bytes.
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError>;
}

/// Images stored on local disk under a base directory.
pub struct LocalStorage {
    base_dir: PathBuf,
}

impl LocalStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.base_dir.join(relative))
    }
}

#[async_trait]
impl ImageStorage for LocalStorage {
    async fn get_url(&self, path: &str) -> Result<String, StorageError> {
        self.resolve(path)?;
        Ok(format!("{}/{}", LOCAL_URL_PREFIX, path))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full_path = self.resolve(path)?;
        tokio::fs::read(&full_path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
            _ => StorageError::Io(e),
        })
    }
}

/// Client for S3-compatible object storage (COS, R2, MinIO).
pub struct ObjectStorage {
    bucket: Box<Bucket>,
}

impl ObjectStorage {
    pub fn new(
        bucket_name: &str,
        region: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }
}

#[async_trait]
impl ImageStorage for ObjectStorage {
    async fn get_url(&self, path: &str) -> Result<String, StorageError> {
        Ok(format!("{}/{}", self.bucket.url(), path.trim_start_matches('/')))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.bucket.get_object(path).await.map_err(StorageError::S3)?;
        match response.status_code() {
            200..=299 => Ok(response.to_vec()),
            404 => Err(StorageError::NotFound(path.to_string())),
            status => Err(StorageError::Status(status)),
        }
    }
}

/// Routes image access to the backend an evaluation was stored with.
#[derive(Clone)]
pub struct ImageStore {
    local: Arc<dyn ImageStorage>,
    object: Option<Arc<dyn ImageStorage>>,
}

impl ImageStore {
    pub fn new(local: Arc<dyn ImageStorage>, object: Option<Arc<dyn ImageStorage>>) -> Self {
        Self { local, object }
    }

    pub fn backend(&self, kind: StorageKind) -> Result<&dyn ImageStorage, StorageError> {
        match kind {
            StorageKind::Local => Ok(self.local.as_ref()),
            StorageKind::Cos => self
                .object
                .as_deref()
                .ok_or(StorageError::Unconfigured(kind)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Object storage returned status {0}")]
    Status(u16),

    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Invalid image path: {0}")]
    InvalidPath(String),

    #[error("No storage backend configured for {0}")]
    Unconfigured(StorageKind),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("photo-critique-{}-{}", name, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("2024/06")).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_local_read_and_url() {
        let dir = scratch_dir("local");
        std::fs::write(dir.join("2024/06/shot.jpg"), b"jpeg bytes").unwrap();
        let storage = LocalStorage::new(&dir);

        assert_eq!(storage.read("2024/06/shot.jpg").await.unwrap(), b"jpeg bytes");
        assert_eq!(
            storage.get_url("2024/06/shot.jpg").await.unwrap(),
            "/api/files/2024/06/shot.jpg"
        );

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_local_missing_file() {
        let dir = scratch_dir("missing");
        let storage = LocalStorage::new(&dir);

        let err = storage.read("2024/06/nope.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(p) if p == "2024/06/nope.jpg"));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_local_rejects_traversal() {
        let storage = LocalStorage::new("uploads");
        assert!(matches!(
            storage.read("../etc/passwd").await,
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            storage.get_url("/etc/passwd").await,
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_unconfigured_object_backend() {
        let store = ImageStore::new(Arc::new(LocalStorage::new("uploads")), None);
        assert!(store.backend(StorageKind::Local).is_ok());
        assert!(matches!(
            store.backend(StorageKind::Cos),
            Err(StorageError::Unconfigured(StorageKind::Cos))
        ));
    }
}
