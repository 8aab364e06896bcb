use std::sync::Arc;

use anyhow::{Context, Result};

use crate::clock::Clock;
use crate::errors::MonitorError;
use crate::models::StaleMonitorConfig;
use crate::parser::normalize_prefix;
use crate::storage::BucketStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub listed: usize,
    /// Deleted, or in dry-run mode, would have been deleted.
    pub deleted: usize,
    pub kept: usize,
    pub failed: usize,
}

/// Deletes objects older than a threshold under a set of prefixes.
pub struct StaleFileSweeper {
    storage: Arc<dyn BucketStorage>,
    clock: Arc<dyn Clock>,
    prefixes: Vec<String>,
    threshold: chrono::Duration,
    dry_run: bool,
}

impl StaleFileSweeper {
    pub fn new(
        config: &StaleMonitorConfig,
        storage: Arc<dyn BucketStorage>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        let prefixes: Vec<String> = config
            .prefixes
            .iter()
            .map(|p| normalize_prefix(p))
            .filter(|p| !p.is_empty())
            .collect();
        if prefixes.is_empty() {
            return Err(MonitorError::Config(
                "At least one prefix is required".to_string(),
            ));
        }
        Ok(Self {
            storage,
            clock,
            prefixes,
            threshold: config.age_threshold()?,
            dry_run: config.dry_run,
        })
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn threshold(&self) -> chrono::Duration {
        self.threshold
    }

    /// One pass over every prefix. Objects strictly older than the threshold
    /// are deleted; a failed delete is logged and the sweep moves on.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for prefix in &self.prefixes {
            let objects = self
                .storage
                .list(prefix)
                .await
                .with_context(|| format!("Failed to list prefix '{}'", prefix))?;
            let now = self.clock.now();

            for object in objects {
                if object.is_prefix_marker(prefix) {
                    continue;
                }
                report.listed += 1;

                let age = now - object.updated_at;
                if age <= self.threshold {
                    report.kept += 1;
                    continue;
                }

                if self.dry_run {
                    tracing::info!(
                        "[dry run] Would delete {} (age {}s)",
                        object.name,
                        age.num_seconds()
                    );
                    report.deleted += 1;
                    continue;
                }

                match self.storage.delete(&object).await {
                    Ok(()) => {
                        tracing::info!("Deleted {} (age {}s)", object.name, age.num_seconds());
                        report.deleted += 1;
                    }
                    Err(e) => {
                        tracing::error!("Failed to delete {}: {:#}", object.name, e);
                        report.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            listed = report.listed,
            deleted = report.deleted,
            kept = report.kept,
            failed = report.failed,
            dry_run = self.dry_run,
            "Sweep complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::models::ObjectMeta;
    use crate::storage::InMemoryBucket;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap()
    }

    fn config() -> StaleMonitorConfig {
        StaleMonitorConfig {
            bucket: "test-bucket".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_old_objects() {
        let bucket = Arc::new(InMemoryBucket::with_objects(vec![
            ObjectMeta::new("uploads/old.png", now() - Duration::days(4), ""),
            ObjectMeta::new("uploads/new.png", now() - Duration::hours(1), ""),
            ObjectMeta::new("output/old.zip", now() - Duration::days(10), ""),
        ]));
        let sweeper =
            StaleFileSweeper::new(&config(), bucket.clone(), Arc::new(FakeClock::new(now())))
                .unwrap();

        let report = sweeper.sweep().await.unwrap();
        assert_eq!(report.listed, 3);
        assert_eq!(report.deleted, 2);
        assert_eq!(report.kept, 1);
        assert_eq!(bucket.names().await, vec!["uploads/new.png"]);
    }

    #[tokio::test]
    async fn test_sweep_never_deletes_prefix_marker() {
        let bucket = Arc::new(InMemoryBucket::with_objects(vec![ObjectMeta::new(
            "uploads/",
            now() - Duration::days(365),
            "",
        )]));
        let sweeper =
            StaleFileSweeper::new(&config(), bucket.clone(), Arc::new(FakeClock::new(now())))
                .unwrap();

        let report = sweeper.sweep().await.unwrap();
        assert_eq!(report, SweepReport::default());
        assert_eq!(bucket.names().await, vec!["uploads/"]);
    }

    #[tokio::test]
    async fn test_dry_run_keeps_everything() {
        let bucket = Arc::new(InMemoryBucket::with_objects(vec![ObjectMeta::new(
            "uploads/old.png",
            now() - Duration::days(4),
            "",
        )]));
        let cfg = StaleMonitorConfig {
            dry_run: true,
            ..config()
        };
        let sweeper =
            StaleFileSweeper::new(&cfg, bucket.clone(), Arc::new(FakeClock::new(now()))).unwrap();

        let report = sweeper.sweep().await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(bucket.deleted().await.is_empty());
        assert_eq!(bucket.names().await, vec!["uploads/old.png"]);
    }

    #[test]
    fn test_new_normalizes_prefixes() {
        let cfg = StaleMonitorConfig {
            prefixes: vec!["/uploads".to_string(), "output//".to_string()],
            ..config()
        };
        let sweeper = StaleFileSweeper::new(
            &cfg,
            Arc::new(InMemoryBucket::new()),
            Arc::new(FakeClock::new(now())),
        )
        .unwrap();
        assert_eq!(sweeper.prefixes(), ["uploads/", "output/"]);
        assert_eq!(sweeper.threshold(), Duration::days(3));
    }

    #[test]
    fn test_new_rejects_huge_age_threshold() {
        let cfg = StaleMonitorConfig {
            age_threshold_secs: u64::MAX,
            ..config()
        };
        let result = StaleFileSweeper::new(
            &cfg,
            Arc::new(InMemoryBucket::new()),
            Arc::new(FakeClock::new(now())),
        );
        assert!(matches!(result, Err(MonitorError::Config(_))));
    }
}
