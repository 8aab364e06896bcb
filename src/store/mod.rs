pub mod memory;
pub mod redis;
pub mod retry;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::StoreError;

pub use self::memory::InMemoryStore;
pub use self::redis::RedisStore;
pub use self::retry::{RetryPolicy, RetryingStore, Sleeper, StoreRetryConfig, TokioSleeper};

/// The store commands the upload scanner issues.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn keys(&self) -> Result<Vec<String>, StoreError>;
    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError>;
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;
    /// Push `value` onto the head of list `queue`, returning the new length.
    async fn lpush(&self, queue: &str, value: &str) -> Result<u64, StoreError>;
}
