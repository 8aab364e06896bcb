use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;

use crate::errors::{MonitorError, StoreError};
use crate::models::RedisConfig;
use crate::store::KeyValueStore;

/// Redis-backed store. Connects lazily and drops the connection after a
/// connection-class failure so the next call reconnects.
pub struct RedisStore {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStore {
    pub fn new(config: &RedisConfig) -> Result<Self, MonitorError> {
        let client = redis::Client::open(config.url()).map_err(|e| {
            MonitorError::Config(format!("Invalid Redis address {}: {}", config.url(), e))
        })?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let mut guard = self.conn.lock().await;
        if let Some(ref conn) = *guard {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        tracing::debug!("Connected to Redis");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn query<T>(&self, cmd: &redis::Cmd) -> Result<T, StoreError>
    where
        T: redis::FromRedisValue + Send,
    {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<T> = cmd.query_async(&mut conn).await;
        let err = match result {
            Ok(value) => return Ok(value),
            Err(e) => StoreError::from(e),
        };
        if err.is_connection() {
            *self.conn.lock().await = None;
        }
        Err(err)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut cmd = redis::cmd("KEYS");
        cmd.arg("*");
        self.query(&cmd).await
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        self.query::<i64>(&cmd).await.map(|_| ())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(key);
        self.query(&cmd).await
    }

    async fn lpush(&self, queue: &str, value: &str) -> Result<u64, StoreError> {
        let mut cmd = redis::cmd("LPUSH");
        cmd.arg(queue).arg(value);
        self.query(&cmd).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_does_not_connect() {
        let config = RedisConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..Default::default()
        };
        assert!(RedisStore::new(&config).is_ok());
    }

    #[test]
    fn test_new_rejects_bad_address() {
        let config = RedisConfig {
            host: "bad host/with spaces".to_string(),
            ..Default::default()
        };
        assert!(matches!(RedisStore::new(&config), Err(MonitorError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connection_error() {
        // Port 1 is reserved and refuses connections on any sane host.
        let config = RedisConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..Default::default()
        };
        let store = RedisStore::new(&config).unwrap();
        let err = store.keys().await.unwrap_err();
        assert!(err.is_connection(), "got {:?}", err);
    }
}
