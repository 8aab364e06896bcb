use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::clock::Clock;
use crate::errors::{MonitorError, ParseError, StoreError};
use crate::models::{
    JobDescriptor, JobKey, JobStatus, JobType, ObjectMeta, UploadMonitorConfig,
};
use crate::monitor::watermark::WatermarkTracker;
use crate::parser::{FilenameParser, UploadPlan};
use crate::storage::BucketStorage;
use crate::store::KeyValueStore;

/// Counters for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Objects listed, prefix markers excluded.
    pub listed: usize,
    /// Objects newer than the watermark.
    pub new: usize,
    pub not_direct: usize,
    pub invalid: usize,
    pub duplicates: usize,
    /// Job descriptors written and enqueued.
    pub written: usize,
    /// Objects abandoned because of a store error.
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// ExistingJobs: filenames already present in the store
// ---------------------------------------------------------------------------

/// Filenames carried by job keys already in the store.
#[derive(Debug, Default)]
pub struct ExistingJobs {
    filenames: HashSet<String>,
}

impl ExistingJobs {
    /// Index the keys returned by the store. Keys that are not job keys are
    /// ignored.
    pub fn from_keys<S: AsRef<str>>(keys: &[S]) -> Self {
        let filenames = keys
            .iter()
            .filter_map(|k| JobKey::parse(k.as_ref()))
            .map(|k| k.filename)
            .collect();
        Self { filenames }
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.filenames.contains(filename)
    }

    /// True when the upload itself or any job it would produce is known.
    pub fn covers(&self, filename: &str, plan: &UploadPlan) -> bool {
        self.contains(filename) || plan.filenames.iter().any(|f| self.contains(f))
    }

    pub fn insert(&mut self, filename: impl Into<String>) {
        self.filenames.insert(filename.into());
    }

    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }
}

// ---------------------------------------------------------------------------
// UploadScanner
// ---------------------------------------------------------------------------

/// Turns new direct uploads into queued jobs.
pub struct UploadScanner {
    storage: Arc<dyn BucketStorage>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    parsers: Vec<FilenameParser>,
    queue: String,
    job_type: JobType,
    hostname: String,
    watermark: WatermarkTracker,
}

impl UploadScanner {
    /// The watermark starts at the clock's current time, so objects already
    /// in the bucket are never picked up.
    pub fn new(
        config: &UploadMonitorConfig,
        storage: Arc<dyn BucketStorage>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        let parsers = config
            .prefixes
            .iter()
            .map(|p| FilenameParser::new(p).map(|f| f.with_max_benchmark(config.max_benchmark)))
            .collect::<Result<Vec<_>, _>>()?;
        let watermark = WatermarkTracker::starting_now(clock.as_ref());
        Ok(Self {
            storage,
            store,
            clock,
            parsers,
            queue: config.queue.clone(),
            job_type: config.job_type,
            hostname: config.hostname.clone(),
            watermark,
        })
    }

    pub fn watermark(&self) -> &WatermarkTracker {
        &self.watermark
    }

    pub fn prefixes(&self) -> Vec<&str> {
        self.parsers.iter().map(|p| p.prefix()).collect()
    }

    /// Run one scan. Listing and key-fetch failures abort the scan and leave
    /// the watermark untouched; per-object store failures are counted.
    pub async fn scan(&mut self) -> Result<ScanReport> {
        let snapshot = self.watermark.begin_scan(self.clock.as_ref());
        let mut report = ScanReport::default();

        let mut candidates: Vec<(usize, ObjectMeta)> = Vec::new();
        for (idx, parser) in self.parsers.iter().enumerate() {
            let objects = self
                .storage
                .list(parser.prefix())
                .await
                .with_context(|| format!("Failed to list prefix '{}'", parser.prefix()))?;
            for object in objects {
                if object.is_prefix_marker(parser.prefix()) {
                    continue;
                }
                report.listed += 1;
                if self.watermark.is_new(object.updated_at) {
                    candidates.push((idx, object));
                }
            }
        }
        report.new = candidates.len();

        if !candidates.is_empty() {
            let keys = self
                .store
                .keys()
                .await
                .context("Failed to fetch existing job keys")?;
            let mut existing = ExistingJobs::from_keys(&keys);
            tracing::debug!(
                keys = keys.len(),
                filenames = existing.len(),
                "Indexed existing jobs"
            );

            for (idx, object) in &candidates {
                let parser = &self.parsers[*idx];
                if let Err(e) = self
                    .process(parser, object, &mut existing, &mut report)
                    .await
                {
                    report.failed += 1;
                    tracing::error!("Failed to enqueue jobs for {}: {}", object.name, e);
                }
            }
        }

        self.watermark.advance(snapshot);

        if report.new > 0 {
            tracing::info!(
                listed = report.listed,
                new = report.new,
                written = report.written,
                duplicates = report.duplicates,
                invalid = report.invalid,
                failed = report.failed,
                "Scan complete"
            );
        } else {
            tracing::debug!(listed = report.listed, "Scan complete, nothing new");
        }
        Ok(report)
    }

    async fn process(
        &self,
        parser: &FilenameParser,
        object: &ObjectMeta,
        existing: &mut ExistingJobs,
        report: &mut ScanReport,
    ) -> Result<(), StoreError> {
        let (filename, plan) = match parser.plan(&object.path, self.job_type) {
            Ok(planned) => planned,
            Err(ParseError::NotDirectUpload) => {
                report.not_direct += 1;
                tracing::debug!("{} is not a direct upload, skipping", object.name);
                return Ok(());
            }
            Err(e) => {
                report.invalid += 1;
                tracing::warn!("Skipping {}: {}", object.name, e);
                return Ok(());
            }
        };

        if existing.covers(&filename, &plan) {
            report.duplicates += 1;
            tracing::warn!("{} tried to get uploaded a second time", filename);
            return Ok(());
        }

        if plan.filenames.len() > 1 {
            tracing::info!(
                "Benchmark upload {} expands into {} jobs",
                filename,
                plan.filenames.len()
            );
        }

        let input_file_name = format!("{}{}", parser.prefix(), filename);
        for job_filename in &plan.filenames {
            let now = self.clock.now();
            let descriptor = JobDescriptor {
                job_type: self.job_type,
                status: JobStatus::New,
                filename: job_filename.clone(),
                url: object.public_url.clone(),
                input_file_name: input_file_name.clone(),
                identity_upload: self.hostname.clone(),
                fields: plan.fields.clone(),
                created_at: now,
                updated_at: now,
            };
            self.publish(&descriptor).await?;
            existing.insert(job_filename.clone());
            report.written += 1;
        }
        existing.insert(filename);
        Ok(())
    }

    /// Write the hash, then push its key onto the queue. A crash in between
    /// leaves a hash nobody will pick up.
    async fn publish(&self, descriptor: &JobDescriptor) -> Result<(), StoreError> {
        let key = JobKey::generate(descriptor.job_type, &descriptor.filename).to_string();
        self.store.hset(&key, &descriptor.to_hash_fields()).await?;
        self.store.lpush(&self.queue, &key).await?;
        tracing::info!("Queued {} on '{}'", key, self.queue);

        // Read-back is informational only; the job is already queued.
        if tracing::enabled!(tracing::Level::DEBUG) {
            match self.store.hgetall(&key).await {
                Ok(written) => tracing::debug!("Wrote {}: {:?}", key, written),
                Err(e) => tracing::debug!("Could not read back {}: {}", key, e),
            }
        }
        Ok(())
    }
}
