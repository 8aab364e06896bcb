pub mod bucket;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ObjectMeta;

pub use bucket::ObjectStoreBucket;
pub use memory::InMemoryBucket;

/// The slice of a cloud bucket the monitors need.
#[async_trait]
pub trait BucketStorage: Send + Sync {
    /// Every object whose key starts with `prefix`, including the prefix
    /// placeholder object when the backend has one.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;
    async fn delete(&self, object: &ObjectMeta) -> Result<()>;
}
