use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::StoreError;
use crate::store::KeyValueStore;

/// Store held in memory: hashes plus lists, enough for the scanner's
/// command set.
#[derive(Default)]
pub struct InMemoryStore {
    hashes: RwLock<HashMap<String, HashMap<String, String>>>,
    lists: RwLock<HashMap<String, VecDeque<String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an empty hash under `key`, e.g. to simulate jobs written
    /// by another replica.
    pub async fn insert_key(&self, key: &str) {
        self.hashes
            .write()
            .await
            .entry(key.to_string())
            .or_default();
    }

    /// List contents from head to tail.
    pub async fn list(&self, queue: &str) -> Vec<String> {
        self.lists
            .read()
            .await
            .get(queue)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn hash_count(&self) -> usize {
        self.hashes.read().await.len()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let hashes = self.hashes.read().await;
        let lists = self.lists.read().await;
        let mut keys: Vec<String> = hashes.keys().chain(lists.keys()).cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        let mut hashes = self.hashes.write().await;
        let hash = hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        Ok(self
            .hashes
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn lpush(&self, queue: &str, value: &str) -> Result<u64, StoreError> {
        let mut lists = self.lists.write().await;
        let list = lists.entry(queue.to_string()).or_default();
        list.push_front(value.to_string());
        Ok(list.len() as u64)
    }
}
