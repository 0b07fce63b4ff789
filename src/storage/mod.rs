//! Object storage for event photos.
//!
//! Supports multiple backends:
//! - `local`: Local filesystem storage
//! - `s3`: S3-compatible object storage (MinIO, AWS S3, etc.)

pub mod local;
pub mod s3;

use crate::app_config::StorageConfig;
use actix_web::web::Bytes;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed stream of bytes for streaming file content.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// A retrieved object.
pub struct StorageObject {
    /// Streaming body content
    pub body: ByteStream,
    /// Content length in bytes
    pub content_length: Option<i64>,
}

/// Storage operation errors.
#[derive(Debug)]
pub enum StorageError {
    /// Object not found
    NotFound(String),
    /// I/O error
    Io(std::io::Error),
    /// S3 error
    S3(String),
    /// Backend misconfigured
    Config(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(msg) => write!(f, "Not found: {}", msg),
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::S3(msg) => write!(f, "S3 error: {}", msg),
            StorageError::Config(msg) => write!(f, "Storage config error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

/// Trait for storage backends.
///
/// Keys are flat names (`<uuid>.<ext>`); backends shard them into
/// `{key[0:2]}/{key[2:4]}/{key}`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store an object under `key`, replacing any previous content.
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Retrieve an object.
    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// Two-level prefix path shared by every backend.
pub(crate) fn sharded_path(key: &str) -> String {
    if key.len() < 4 || !key.is_char_boundary(4) {
        key.to_string()
    } else {
        format!("{}/{}/{}", &key[0..2], &key[2..4], key)
    }
}

/// Builds the backend named in the configuration.
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    match config.backend.as_str() {
        "local" => Ok(Arc::new(local::LocalStorage::new(
            config.local_path.clone().into(),
        )?)),
        "s3" => Ok(Arc::new(s3::S3Storage::from_config(config)?)),
        other => Err(StorageError::Config(format!(
            "Unknown storage backend '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharded_path() {
        assert_eq!(sharded_path("abcdef.jpg"), "ab/cd/abcdef.jpg");
        assert_eq!(sharded_path("abc"), "abc");
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let config = StorageConfig {
            backend: "ftp".to_string(),
            ..Default::default()
        };
        assert!(matches!(from_config(&config), Err(StorageError::Config(_))));
    }
}
