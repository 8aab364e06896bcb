pub mod stale;
pub mod upload;
pub mod watermark;

use std::time::Duration;

use anyhow::Result;

pub use stale::{StaleFileSweeper, SweepReport};
pub use upload::{ExistingJobs, ScanReport, UploadScanner};
pub use watermark::{ScanSnapshot, WatermarkTracker};

/// Scan, sleep, repeat until Ctrl+C. A failed scan ends the loop with its
/// error.
pub async fn run_upload_monitor(mut scanner: UploadScanner, interval: Duration) -> Result<()> {
    tracing::info!(
        "Watching {:?} every {}s",
        scanner.prefixes(),
        interval.as_secs()
    );
    loop {
        scanner.scan().await?;
        if wait_or_shutdown(interval).await {
            tracing::info!("Received Ctrl+C, stopping upload monitor");
            return Ok(());
        }
    }
}

pub async fn run_stale_monitor(sweeper: StaleFileSweeper, interval: Duration) -> Result<()> {
    tracing::info!(
        "Pruning {:?} of files older than {}s every {}s",
        sweeper.prefixes(),
        sweeper.threshold().num_seconds(),
        interval.as_secs()
    );
    loop {
        sweeper.sweep().await?;
        if wait_or_shutdown(interval).await {
            tracing::info!("Received Ctrl+C, stopping stale file monitor");
            return Ok(());
        }
    }
}

/// Sleep for `interval`. Returns true if Ctrl+C arrived first.
async fn wait_or_shutdown(interval: Duration) -> bool {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = tokio::time::sleep(interval) => false,
    }
}

