use std::sync::Arc;

use anyhow::Result;

use crate::clock::SystemClock;
use crate::models::UploadMonitorConfig;
use crate::monitor::{run_upload_monitor, UploadScanner};
use crate::storage::ObjectStoreBucket;
use crate::store::{RedisStore, RetryingStore, StoreRetryConfig};

/// Build the scanner against the real bucket and Redis, then loop until
/// Ctrl+C or a fatal error.
pub async fn cmd_watch(config: &UploadMonitorConfig) -> Result<()> {
    config.validate()?;

    let storage = ObjectStoreBucket::new(config.cloud_provider, &config.bucket)?;
    let redis = RedisStore::new(&config.redis)?;
    let store = RetryingStore::new(
        Arc::new(redis),
        StoreRetryConfig::with_backoff(config.redis.backoff(), config.redis.busy_retries),
    );

    let scanner = UploadScanner::new(
        config,
        Arc::new(storage),
        Arc::new(store),
        Arc::new(SystemClock),
    )?;

    tracing::info!(
        "Monitoring {} bucket '{}' for {} jobs (queue '{}', redis {})",
        config.cloud_provider,
        config.bucket,
        config.job_type,
        config.queue,
        config.redis.url()
    );

    run_upload_monitor(scanner, config.interval()).await
}
