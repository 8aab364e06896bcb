use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as StorePath;
use object_store::ObjectStore;

use crate::errors::MonitorError;
use crate::models::{CloudProvider, ObjectMeta};
use crate::storage::BucketStorage;

/// A GCS or S3 bucket reached through `object_store`. Credentials come from
/// the provider's usual environment variables.
pub struct ObjectStoreBucket {
    inner: Arc<dyn ObjectStore>,
    provider: CloudProvider,
    bucket: String,
}

impl ObjectStoreBucket {
    pub fn new(provider: CloudProvider, bucket: &str) -> Result<Self, MonitorError> {
        if bucket.trim().is_empty() {
            return Err(MonitorError::Config("Bucket name cannot be empty".to_string()));
        }

        let inner: Arc<dyn ObjectStore> = match provider {
            CloudProvider::Gke => Arc::new(
                GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(|e| {
                        MonitorError::Config(format!("Could not open GCS bucket '{}': {}", bucket, e))
                    })?,
            ),
            CloudProvider::Aws => Arc::new(
                AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(|e| {
                        MonitorError::Config(format!("Could not open S3 bucket '{}': {}", bucket, e))
                    })?,
            ),
        };

        tracing::info!(provider = %provider, bucket, "Connected to bucket");

        Ok(Self {
            inner,
            provider,
            bucket: bucket.to_string(),
        })
    }

    /// Wrap an already-built store, e.g. `object_store::memory::InMemory`.
    pub fn with_store(inner: Arc<dyn ObjectStore>, provider: CloudProvider, bucket: &str) -> Self {
        Self {
            inner,
            provider,
            bucket: bucket.to_string(),
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        public_url(self.provider, &self.bucket, key)
    }
}

pub fn public_url(provider: CloudProvider, bucket: &str, key: &str) -> String {
    match provider {
        CloudProvider::Gke => format!("https://storage.googleapis.com/{}/{}", bucket, key),
        CloudProvider::Aws => format!("https://{}.s3.amazonaws.com/{}", bucket, key),
    }
}

#[async_trait]
impl BucketStorage for ObjectStoreBucket {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let store_prefix = StorePath::from(prefix);
        let metas: Vec<object_store::ObjectMeta> = self
            .inner
            .list(Some(&store_prefix))
            .try_collect()
            .await
            .map_err(MonitorError::from)
            .with_context(|| format!("Failed to list {}/{}", self.bucket, prefix))?;

        Ok(metas
            .into_iter()
            .map(|meta| {
                let key = meta.location.to_string();
                ObjectMeta::new(key.clone(), meta.last_modified, self.public_url(&key))
            })
            .collect())
    }

    async fn delete(&self, object: &ObjectMeta) -> Result<()> {
        self.inner
            .delete(&StorePath::from(object.name.as_str()))
            .await
            .map_err(MonitorError::from)
            .with_context(|| format!("Failed to delete {}", object.name))?;
        Ok(())
    }
}
