//! S3-compatible storage backend.

use super::{sharded_path, ByteStream, StorageBackend, StorageError, StorageObject};
use crate::app_config::StorageConfig;
use actix_web::web::Bytes;
use async_trait::async_trait;
use futures::TryStreamExt;
use rusoto_core::{Region, RusotoError};
use rusoto_s3::{GetObjectError, GetObjectRequest, HeadObjectRequest, PutObjectRequest, S3Client, S3};

/// S3-compatible storage backend.
pub struct S3Storage {
    s3: S3Client,
    bucket_name: String,
}

impl S3Storage {
    pub fn new(region: Region, bucket_name: String) -> S3Storage {
        log::info!("S3Storage initialized for bucket: {}", bucket_name);

        S3Storage {
            s3: S3Client::new(region),
            bucket_name,
        }
    }

    /// A non-empty `s3_endpoint` selects a custom endpoint (MinIO and friends).
    pub fn from_config(config: &StorageConfig) -> Result<S3Storage, StorageError> {
        let region = if config.s3_endpoint.is_empty() {
            config
                .s3_region
                .parse::<Region>()
                .map_err(|e| StorageError::Config(e.to_string()))?
        } else {
            Region::Custom {
                name: config.s3_region.clone(),
                endpoint: config.s3_endpoint.clone(),
            }
        };

        Ok(Self::new(region, config.s3_bucket.clone()))
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        log::info!("S3Storage: put_object: {}", key);

        let request = PutObjectRequest {
            bucket: self.bucket_name.clone(),
            key: sharded_path(key),
            body: Some(data.into()),
            content_type: Some(content_type.to_string()),
            ..Default::default()
        };

        self.s3
            .put_object(request)
            .await
            .map_err(|e| StorageError::S3(e.to_string()))?;

        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<StorageObject, StorageError> {
        log::debug!("S3Storage: get_object: {}", key);

        let request = GetObjectRequest {
            bucket: self.bucket_name.clone(),
            key: sharded_path(key),
            ..Default::default()
        };

        let output = self.s3.get_object(request).await.map_err(|e| match e {
            RusotoError::Service(GetObjectError::NoSuchKey(msg)) => StorageError::NotFound(msg),
            e => StorageError::S3(e.to_string()),
        })?;

        let body: ByteStream = match output.body {
            Some(stream) => Box::pin(stream.map_ok(Bytes::from)),
            None => return Err(StorageError::NotFound(key.to_string())),
        };

        Ok(StorageObject {
            body,
            content_length: output.content_length,
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let request = HeadObjectRequest {
            bucket: self.bucket_name.clone(),
            key: sharded_path(key),
            ..Default::default()
        };

        match self.s3.head_object(request).await {
            Ok(_) => Ok(true),
            // HEAD carries no body, so a missing key surfaces as a bare 404.
            Err(RusotoError::Unknown(resp)) if resp.status.as_u16() == 404 => Ok(false),
            Err(e) => Err(StorageError::S3(e.to_string())),
        }
    }
}
