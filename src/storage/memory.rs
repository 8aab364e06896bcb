use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::ObjectMeta;
use crate::storage::BucketStorage;

/// Bucket held in memory. Used by tests and dry local runs.
#[derive(Default)]
pub struct InMemoryBucket {
    objects: RwLock<Vec<ObjectMeta>>,
    deleted: RwLock<Vec<String>>,
}

impl InMemoryBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects(objects: Vec<ObjectMeta>) -> Self {
        Self {
            objects: RwLock::new(objects),
            deleted: RwLock::new(Vec::new()),
        }
    }

    /// Add an object, replacing any existing object with the same name.
    pub async fn put(&self, object: ObjectMeta) {
        let mut objects = self.objects.write().await;
        objects.retain(|o| o.name != object.name);
        objects.push(object);
    }

    pub async fn names(&self) -> Vec<String> {
        self.objects.read().await.iter().map(|o| o.name.clone()).collect()
    }

    /// Names passed to `delete`, in call order.
    pub async fn deleted(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }
}

#[async_trait]
impl BucketStorage for InMemoryBucket {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let bare = prefix.trim_end_matches('/');
        Ok(self
            .objects
            .read()
            .await
            .iter()
            .filter(|o| o.name.starts_with(prefix) || o.name == bare)
            .cloned()
            .collect())
    }

    async fn delete(&self, object: &ObjectMeta) -> Result<()> {
        let mut objects = self.objects.write().await;
        let before = objects.len();
        objects.retain(|o| o.name != object.name);
        if objects.len() == before {
            return Err(anyhow::anyhow!("No such object: {}", object.name));
        }
        self.deleted.write().await.push(object.name.clone());
        Ok(())
    }
}
