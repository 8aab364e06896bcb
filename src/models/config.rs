use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::MonitorError;
use crate::models::JobType;
use crate::parser::DEFAULT_MAX_BENCHMARK;

/// Largest accepted age threshold: 100 years.
pub const MAX_AGE_THRESHOLD_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    /// Google Cloud Storage
    Gke,
    /// Amazon S3
    Aws,
}

impl CloudProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Gke => "gke",
            CloudProvider::Aws => "aws",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudProvider {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gke" | "gcp" | "gcs" => Ok(CloudProvider::Gke),
            "aws" | "s3" => Ok(CloudProvider::Aws),
            other => Err(MonitorError::Config(format!(
                "Invalid value for cloud provider: '{}'. Expected: gke or aws",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    /// Seconds to wait between attempts while the store is unreachable.
    #[serde(default = "default_redis_backoff_secs")]
    pub backoff_secs: u64,
    /// Attempts allowed for a busy store before giving up.
    #[serde(default = "default_busy_retries")]
    pub busy_retries: u32,
}

fn default_redis_host() -> String {
    "redis-master".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_redis_backoff_secs() -> u64 {
    5
}

fn default_busy_retries() -> u32 {
    3
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            backoff_secs: default_redis_backoff_secs(),
            busy_retries: default_busy_retries(),
        }
    }
}

impl RedisConfig {
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadMonitorConfig {
    pub bucket: String,
    #[serde(default = "default_cloud_provider")]
    pub cloud_provider: CloudProvider,
    #[serde(default = "default_upload_prefixes")]
    pub prefixes: Vec<String>,
    #[serde(default = "default_queue")]
    pub queue: String,
    #[serde(default = "default_job_type")]
    pub job_type: JobType,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_upload_interval_secs")]
    pub interval_secs: u64,
    /// Largest N accepted in a `benchmarking<N>special` upload.
    #[serde(default = "default_max_benchmark")]
    pub max_benchmark: u32,
    #[serde(default)]
    pub redis: RedisConfig,
}

fn default_cloud_provider() -> CloudProvider {
    CloudProvider::Gke
}

fn default_upload_prefixes() -> Vec<String> {
    vec!["uploads/".to_string()]
}

fn default_queue() -> String {
    "predict".to_string()
}

fn default_job_type() -> JobType {
    JobType::Predict
}

fn default_hostname() -> String {
    "invalid_hostname".to_string()
}

fn default_upload_interval_secs() -> u64 {
    5
}

fn default_max_benchmark() -> u32 {
    DEFAULT_MAX_BENCHMARK
}

impl Default for UploadMonitorConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            cloud_provider: default_cloud_provider(),
            prefixes: default_upload_prefixes(),
            queue: default_queue(),
            job_type: default_job_type(),
            hostname: default_hostname(),
            interval_secs: default_upload_interval_secs(),
            max_benchmark: default_max_benchmark(),
            redis: RedisConfig::default(),
        }
    }
}

impl UploadMonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        validate_bucket(&self.bucket)?;
        validate_prefixes(&self.prefixes)?;
        validate_interval(self.interval_secs)?;
        if self.queue.trim().is_empty() {
            return Err(MonitorError::Config("Queue name cannot be empty".to_string()));
        }
        if self.max_benchmark == 0 {
            return Err(MonitorError::Config(
                "Benchmark limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleMonitorConfig {
    pub bucket: String,
    #[serde(default = "default_cloud_provider")]
    pub cloud_provider: CloudProvider,
    #[serde(default = "default_stale_prefixes")]
    pub prefixes: Vec<String>,
    #[serde(default = "default_age_threshold_secs")]
    pub age_threshold_secs: u64,
    #[serde(default = "default_stale_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_stale_prefixes() -> Vec<String> {
    vec!["uploads/".to_string(), "output/".to_string()]
}

fn default_age_threshold_secs() -> u64 {
    3 * 24 * 60 * 60
}

fn default_stale_interval_secs() -> u64 {
    6 * 60 * 60
}

impl Default for StaleMonitorConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            cloud_provider: default_cloud_provider(),
            prefixes: default_stale_prefixes(),
            age_threshold_secs: default_age_threshold_secs(),
            interval_secs: default_stale_interval_secs(),
            dry_run: false,
        }
    }
}

impl StaleMonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn age_threshold(&self) -> Result<chrono::Duration, MonitorError> {
        let out_of_range = || {
            MonitorError::Config(format!(
                "Age threshold {}s is out of range (max {}s)",
                self.age_threshold_secs, MAX_AGE_THRESHOLD_SECS
            ))
        };
        if self.age_threshold_secs > MAX_AGE_THRESHOLD_SECS {
            return Err(out_of_range());
        }
        let secs = i64::try_from(self.age_threshold_secs).map_err(|_| out_of_range())?;
        chrono::Duration::try_seconds(secs).ok_or_else(out_of_range)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        validate_bucket(&self.bucket)?;
        validate_prefixes(&self.prefixes)?;
        validate_interval(self.interval_secs)?;
        self.age_threshold().map(|_| ())
    }
}

fn validate_bucket(bucket: &str) -> Result<(), MonitorError> {
    if bucket.trim().is_empty() {
        return Err(MonitorError::Config(
            "BUCKET must be set to the name of the bucket to monitor".to_string(),
        ));
    }
    Ok(())
}

fn validate_interval(interval_secs: u64) -> Result<(), MonitorError> {
    if interval_secs == 0 {
        return Err(MonitorError::Config(
            "Interval must be at least 1 second".to_string(),
        ));
    }
    Ok(())
}

fn validate_prefixes(prefixes: &[String]) -> Result<(), MonitorError> {
    if prefixes.is_empty() {
        return Err(MonitorError::Config(
            "At least one prefix is required".to_string(),
        ));
    }
    Ok(())
}
