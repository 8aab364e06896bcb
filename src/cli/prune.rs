use std::sync::Arc;

use anyhow::Result;

use crate::clock::SystemClock;
use crate::models::StaleMonitorConfig;
use crate::monitor::{run_stale_monitor, StaleFileSweeper};
use crate::storage::ObjectStoreBucket;

pub async fn cmd_prune(config: &StaleMonitorConfig) -> Result<()> {
    config.validate()?;

    let storage = ObjectStoreBucket::new(config.cloud_provider, &config.bucket)?;
    let sweeper = StaleFileSweeper::new(config, Arc::new(storage), Arc::new(SystemClock))?;

    if config.dry_run {
        tracing::info!("Dry run: nothing will be deleted");
    }
    run_stale_monitor(sweeper, config.interval()).await
}
