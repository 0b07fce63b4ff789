//! Local filesystem storage backend.

use super::{sharded_path, ByteStream, StorageBackend, StorageError, StorageObject};
use actix_web::web::{self, Bytes};
use async_trait::async_trait;
use futures::stream;
use std::fs;
use std::path::PathBuf;

/// Local filesystem storage backend.
pub struct LocalStorage {
    /// Base path for file storage
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend.
    ///
    /// The `base_path` directory will be created if it doesn't exist.
    pub fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path)?;
        log::info!("LocalStorage initialized at {:?}", base_path);
        Ok(Self { base_path })
    }

    fn get_file_path(&self, key: &str) -> PathBuf {
        self.base_path.join(sharded_path(key))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.get_file_path(key);
        log::info!("LocalStorage: put_object: {:?}", path);

        web::block(move || {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, data)
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError> {
        let path = self.get_file_path(key);
        log::debug!("LocalStorage: get_object: {:?}", path);

        let buffer = web::block(move || fs::read(path))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        let content_length = buffer.len() as i64;
        let body: ByteStream = Box::pin(stream::once(async move { Ok(Bytes::from(buffer)) }));

        Ok(StorageObject {
            body,
            content_length: Some(content_length),
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get_file_path(key).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[actix_rt::test]
    async fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf()).unwrap();

        storage
            .put_object("0123abcd.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();

        assert!(dir.path().join("01/23/0123abcd.png").exists());
        assert!(storage.exists("0123abcd.png").await.unwrap());

        let object = storage.get_object("0123abcd.png").await.unwrap();
        assert_eq!(object.content_length, Some(3));
        let chunks: Vec<Bytes> = object.body.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), vec![1, 2, 3]);
    }

    #[actix_rt::test]
    async fn test_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf()).unwrap();

        assert!(!storage.exists("ffffffff.jpg").await.unwrap());
        assert!(matches!(
            storage.get_object("ffffffff.jpg").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
