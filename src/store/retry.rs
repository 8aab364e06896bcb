//! Retry wrapper for store commands.
//!
//! Connection failures block the caller until the store answers again.
//! A busy store gets a few more attempts. Any other failure is returned
//! straight away: a protocol or type error will not fix itself by waiting.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::errors::StoreError;
use crate::store::KeyValueStore;

/// How one class of failure is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause before each retry.
    pub backoff: Duration,
    /// Retries allowed after the first attempt. `None` retries forever.
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded(backoff: Duration) -> Self {
        Self {
            backoff,
            max_retries: None,
        }
    }

    pub fn bounded(max_retries: u32, backoff: Duration) -> Self {
        Self {
            backoff,
            max_retries: Some(max_retries),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn allows(&self, retries_so_far: u32) -> bool {
        self.max_retries.map_or(true, |max| retries_so_far < max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRetryConfig {
    pub connection: RetryPolicy,
    pub busy: RetryPolicy,
}

impl Default for StoreRetryConfig {
    fn default() -> Self {
        Self {
            connection: RetryPolicy::unbounded(Duration::from_secs(5)),
            busy: RetryPolicy::bounded(3, Duration::from_secs(5)),
        }
    }
}

impl StoreRetryConfig {
    /// Same backoff for both classes, connection retries unbounded.
    pub fn with_backoff(backoff: Duration, busy_retries: u32) -> Self {
        Self {
            connection: RetryPolicy::unbounded(backoff),
            busy: RetryPolicy::bounded(busy_retries, backoff),
        }
    }
}

/// Pauses between retries. Swapped out in tests so nothing really sleeps.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// `KeyValueStore` that retries the wrapped store according to
/// `StoreRetryConfig`.
pub struct RetryingStore {
    inner: Arc<dyn KeyValueStore>,
    config: StoreRetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn KeyValueStore>, config: StoreRetryConfig) -> Self {
        Self::with_sleeper(inner, config, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(
        inner: Arc<dyn KeyValueStore>,
        config: StoreRetryConfig,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            inner,
            config,
            sleeper,
        }
    }

    async fn call<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StoreError>> + Send,
        T: Send,
    {
        let mut connection_retries = 0u32;
        let mut busy_retries = 0u32;

        loop {
            let err = match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let (policy, retries) = match err {
                StoreError::Connection(_) => (&self.config.connection, &mut connection_retries),
                StoreError::Busy(_) => (&self.config.busy, &mut busy_retries),
                _ => return Err(err),
            };

            if !policy.allows(*retries) {
                warn!(operation, retries = *retries, error = %err, "Giving up on store command");
                return Err(err);
            }
            *retries += 1;

            warn!(
                operation,
                attempt = *retries,
                backoff_secs = policy.backoff.as_secs_f64(),
                error = %err,
                "Store command failed, retrying"
            );
            self.sleeper.sleep(policy.backoff).await;
        }
    }
}

#[async_trait]
impl KeyValueStore for RetryingStore {
    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.call("KEYS", move || self.inner.keys()).await
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        self.call("HSET", move || self.inner.hset(key, fields)).await
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.call("HGETALL", move || self.inner.hgetall(key)).await
    }

    async fn lpush(&self, queue: &str, value: &str) -> Result<u64, StoreError> {
        self.call("LPUSH", move || self.inner.lpush(queue, value)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails the first `failures` calls with `error`, then answers.
    struct FlakyStore {
        failures: u32,
        error: StoreError,
        calls: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32, error: StoreError) -> Self {
            Self {
                failures,
                error,
                calls: AtomicU32::new(0),
            }
        }

        fn check(&self) -> Result<(), StoreError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn keys(&self) -> Result<Vec<String>, StoreError> {
            self.check()?;
            Ok(vec!["abc".to_string(), "123".to_string()])
        }

        async fn hset(&self, _key: &str, _fields: &[(String, String)]) -> Result<(), StoreError> {
            self.check()
        }

        async fn hgetall(&self, _key: &str) -> Result<HashMap<String, String>, StoreError> {
            self.check()?;
            Ok(HashMap::from([("key".to_string(), "value".to_string())]))
        }

        async fn lpush(&self, _queue: &str, _value: &str) -> Result<u64, StoreError> {
            self.check()?;
            Ok(1)
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn wrap(
        inner: Arc<FlakyStore>,
        config: StoreRetryConfig,
    ) -> (RetryingStore, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        let store = RetryingStore::with_sleeper(inner, config, sleeper.clone());
        (store, sleeper)
    }

    fn connection_error() -> StoreError {
        StoreError::Connection("thrown on purpose".to_string())
    }

    // -----------------------------------------------------------------------
    // policy
    // -----------------------------------------------------------------------

    #[test]
    fn test_default_config() {
        let config = StoreRetryConfig::default();
        assert_eq!(config.connection.max_retries, None);
        assert_eq!(config.connection.backoff, Duration::from_secs(5));
        assert_eq!(config.busy.max_retries, Some(3));
    }

    #[test]
    fn test_policy_builder() {
        let policy = RetryPolicy::unbounded(Duration::from_secs(1))
            .with_backoff(Duration::from_millis(10))
            .with_max_retries(Some(2));
        assert_eq!(policy, RetryPolicy::bounded(2, Duration::from_millis(10)));
        assert!(policy.allows(1));
        assert!(!policy.allows(2));
        assert!(RetryPolicy::unbounded(Duration::ZERO).allows(u32::MAX - 1));
    }

    // -----------------------------------------------------------------------
    // connection failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_keys_retries_until_connected() {
        let inner = Arc::new(FlakyStore::new(2, connection_error()));
        let (store, sleeper) = wrap(inner.clone(), StoreRetryConfig::default());

        let keys = store.keys().await.expect("keys");
        assert_eq!(keys, vec!["abc", "123"]);
        assert_eq!(inner.calls(), 3);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(5); 2]);
    }

    #[tokio::test]
    async fn test_hgetall_retries_until_connected() {
        let inner = Arc::new(FlakyStore::new(2, connection_error()));
        let (store, _) = wrap(inner.clone(), StoreRetryConfig::default());

        let data = store.hgetall("redis_hash").await.expect("hgetall");
        assert_eq!(data.get("key").map(String::as_str), Some("value"));
        assert_eq!(inner.calls(), 3);
    }

    #[tokio::test]
    async fn test_hset_retries_many_connection_failures() {
        let inner = Arc::new(FlakyStore::new(50, connection_error()));
        let config = StoreRetryConfig::with_backoff(Duration::from_millis(10), 3);
        let (store, sleeper) = wrap(inner.clone(), config);

        let fields = vec![("key".to_string(), "value".to_string())];
        store.hset("rhash", &fields).await.expect("hset");
        assert_eq!(inner.calls(), 51);
        assert_eq!(sleeper.sleeps().len(), 50);
        assert!(sleeper.sleeps().iter().all(|d| *d == Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn test_bounded_connection_policy_gives_up() {
        let inner = Arc::new(FlakyStore::new(10, connection_error()));
        let config = StoreRetryConfig {
            connection: RetryPolicy::bounded(2, Duration::ZERO),
            ..Default::default()
        };
        let (store, sleeper) = wrap(inner.clone(), config);

        let err = store.lpush("q", "v").await.unwrap_err();
        assert!(err.is_connection());
        assert_eq!(inner.calls(), 3);
        assert_eq!(sleeper.sleeps().len(), 2);
    }

    // -----------------------------------------------------------------------
    // busy and other failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_busy_is_retried_within_bound() {
        let inner = Arc::new(FlakyStore::new(
            3,
            StoreError::Busy("BUSY SCRIPT KILL".to_string()),
        ));
        let (store, sleeper) = wrap(inner.clone(), StoreRetryConfig::default());

        assert_eq!(store.lpush("q", "v").await, Ok(1));
        assert_eq!(inner.calls(), 4);
        assert_eq!(sleeper.sleeps().len(), 3);
    }

    #[tokio::test]
    async fn test_busy_past_bound_propagates() {
        let inner = Arc::new(FlakyStore::new(
            4,
            StoreError::Busy("BUSY SCRIPT KILL".to_string()),
        ));
        let (store, _) = wrap(inner.clone(), StoreRetryConfig::default());

        match store.keys().await {
            Err(StoreError::Busy(_)) => {}
            other => panic!("Expected Busy, got: {:?}", other),
        }
        assert_eq!(inner.calls(), 4);
    }

    #[tokio::test]
    async fn test_response_error_is_not_retried() {
        let inner = Arc::new(FlakyStore::new(
            1,
            StoreError::Response("OTHER ERROR".to_string()),
        ));
        let (store, sleeper) = wrap(inner.clone(), StoreRetryConfig::default());

        match store.keys().await {
            Err(StoreError::Response(msg)) => assert_eq!(msg, "OTHER ERROR"),
            other => panic!("Expected Response, got: {:?}", other),
        }
        assert_eq!(inner.calls(), 1);
        assert!(sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_other_error_is_not_retried() {
        let inner = Arc::new(FlakyStore::new(1, StoreError::Other("bad".to_string())));
        let (store, _) = wrap(inner.clone(), StoreRetryConfig::default());

        assert!(store.hgetall("k").await.is_err());
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_counters_are_per_call() {
        let inner = Arc::new(FlakyStore::new(
            3,
            StoreError::Busy("BUSY".to_string()),
        ));
        let config = StoreRetryConfig {
            busy: RetryPolicy::bounded(2, Duration::ZERO),
            ..Default::default()
        };
        let (store, _) = wrap(inner.clone(), config);

        // first call: 3 attempts, all busy -> gives up
        assert!(store.keys().await.is_err());
        // second call starts with a fresh budget and succeeds
        assert!(store.keys().await.is_ok());
    }
}
