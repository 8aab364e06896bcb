pub mod prune;
pub mod watch;

use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand};

use crate::errors::MonitorError;
use crate::models::{
    CloudProvider, JobType, RedisConfig, StaleMonitorConfig, UploadMonitorConfig,
};
use crate::parser::parse_prefixes;

/// Bucket Monitor - turns direct uploads in a storage bucket into queued jobs
#[derive(Parser, Debug)]
#[command(
    name = "bucket-monitor",
    version,
    about = "Bucket Monitor - turns direct uploads in a storage bucket into queued jobs"
)]
pub struct Cli {
    /// Name of the bucket to monitor
    #[arg(long, env = "BUCKET", global = true)]
    pub bucket: Option<String>,

    /// Storage backend: gke or aws
    #[arg(long, env = "CLOUD_PROVIDER", default_value = "gke", global = true)]
    pub cloud_provider: String,

    /// Comma-separated bucket prefixes [default: uploads/ for watch, uploads/,output/ for prune]
    #[arg(long, env = "PREFIX", global = true)]
    pub prefix: Option<String>,

    /// Seconds between passes [default: 5 for watch, 21600 for prune]
    #[arg(long, env = "INTERVAL", global = true)]
    pub interval: Option<u64>,

    /// Debug logging
    #[arg(short, long, env = "DEBUG", global = true, value_parser = FalseyValueParser::new())]
    pub debug: bool,

    /// Also write logs to this file, rotated at 10 MB
    #[arg(long, env = "LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Redis host
    #[arg(long, env = "REDIS_HOST", default_value = "redis-master", global = true)]
    pub redis_host: String,

    /// Redis port
    #[arg(long, env = "REDIS_PORT", default_value_t = 6379, global = true)]
    pub redis_port: u16,

    /// Seconds to wait before retrying an unreachable Redis
    #[arg(long, env = "REDIS_BACKOFF", default_value_t = 5, global = true)]
    pub redis_backoff: u64,

    /// Queue that job keys are pushed onto
    #[arg(long, env = "QUEUE", default_value = "predict", global = true)]
    pub queue: String,

    /// Job type to create: predict or notebook
    #[arg(long, env = "JOB_TYPE", default_value = "predict", global = true)]
    pub job_type: JobType,

    /// Identity recorded on every job
    #[arg(long, env = "HOSTNAME", default_value = "invalid_hostname", global = true)]
    pub hostname: String,

    /// Largest N accepted in a benchmarking<N>special upload
    #[arg(long, env = "MAX_BENCHMARK", default_value_t = 1000, global = true)]
    pub max_benchmark: u32,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch for new uploads and queue jobs for them (default)
    Watch,

    /// Periodically delete files older than a threshold
    Prune {
        /// Age in seconds past which a file is deleted
        #[arg(long, env = "AGE_THRESHOLD", default_value_t = 259200)]
        age_threshold: u64,

        /// Log what would be deleted without deleting
        #[arg(long, env = "DRY_RUN", value_parser = FalseyValueParser::new())]
        dry_run: bool,
    },
}

impl Cli {
    fn bucket(&self) -> String {
        self.bucket.clone().unwrap_or_default()
    }

    fn provider(&self) -> Result<CloudProvider, MonitorError> {
        self.cloud_provider.parse()
    }

    /// Configuration for the upload scanner.
    pub fn upload_config(&self) -> Result<UploadMonitorConfig, MonitorError> {
        let defaults = UploadMonitorConfig::default();
        let config = UploadMonitorConfig {
            bucket: self.bucket(),
            cloud_provider: self.provider()?,
            prefixes: self
                .prefix
                .as_deref()
                .map(parse_prefixes)
                .unwrap_or(defaults.prefixes),
            queue: self.queue.clone(),
            job_type: self.job_type,
            hostname: self.hostname.clone(),
            interval_secs: self.interval.unwrap_or(defaults.interval_secs),
            max_benchmark: self.max_benchmark,
            redis: RedisConfig {
                host: self.redis_host.clone(),
                port: self.redis_port,
                backoff_secs: self.redis_backoff,
                ..defaults.redis
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration for the stale file sweeper.
    pub fn stale_config(
        &self,
        age_threshold: u64,
        dry_run: bool,
    ) -> Result<StaleMonitorConfig, MonitorError> {
        let defaults = StaleMonitorConfig::default();
        let config = StaleMonitorConfig {
            bucket: self.bucket(),
            cloud_provider: self.provider()?,
            prefixes: self
                .prefix
                .as_deref()
                .map(parse_prefixes)
                .unwrap_or(defaults.prefixes),
            age_threshold_secs: age_threshold,
            interval_secs: self.interval.unwrap_or(defaults.interval_secs),
            dry_run,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Dispatch the CLI command to the appropriate handler.
pub async fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        None | Some(Commands::Watch) => watch::cmd_watch(&cli.upload_config()?).await,
        Some(Commands::Prune {
            age_threshold,
            dry_run,
        }) => prune::cmd_prune(&cli.stale_config(*age_threshold, *dry_run)?).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn test_cli_version_flag() {
        let err = Cli::try_parse_from(["bucket-monitor", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        assert!(err.to_string().contains("0.1.0"));
    }

    #[test]
    fn test_cli_no_subcommand_means_watch() {
        let cli = parse(&["bucket-monitor", "--bucket", "b"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.bucket.as_deref(), Some("b"));
    }

    #[test]
    fn test_cli_upload_config_from_flags() {
        let cli = parse(&[
            "bucket-monitor",
            "--bucket",
            "my-bucket",
            "--cloud-provider",
            "aws",
            "--prefix",
            "/incoming",
            "--interval",
            "30",
            "--redis-host",
            "localhost",
            "--redis-port",
            "6380",
            "--redis-backoff",
            "2",
            "--queue",
            "segmentation",
            "--job-type",
            "notebook",
            "--hostname",
            "monitor-7",
            "--max-benchmark",
            "50",
            "watch",
        ]);
        assert!(matches!(cli.command, Some(Commands::Watch)));

        let config = cli.upload_config().unwrap();
        assert_eq!(config.bucket, "my-bucket");
        assert_eq!(config.cloud_provider, CloudProvider::Aws);
        assert_eq!(config.prefixes, vec!["incoming/"]);
        assert_eq!(config.interval_secs, 30);
        assert_eq!(config.redis.url(), "redis://localhost:6380/");
        assert_eq!(config.redis.backoff_secs, 2);
        assert_eq!(config.redis.busy_retries, 3);
        assert_eq!(config.queue, "segmentation");
        assert_eq!(config.job_type, JobType::Notebook);
        assert_eq!(config.hostname, "monitor-7");
        assert_eq!(config.max_benchmark, 50);
    }

    #[test]
    fn test_cli_rejects_zero_interval_and_huge_threshold() {
        let cli = parse(&["bucket-monitor", "--bucket", "b", "--interval", "0"]);
        assert!(matches!(cli.upload_config(), Err(MonitorError::Config(_))));
        assert!(matches!(cli.stale_config(60, false), Err(MonitorError::Config(_))));

        let cli = parse(&["bucket-monitor", "--bucket", "b"]);
        assert!(matches!(
            cli.stale_config(u64::MAX, false),
            Err(MonitorError::Config(_))
        ));
    }

    #[test]
    fn test_cli_prune_defaults() {
        let cli = parse(&[
            "bucket-monitor",
            "prune",
            "--bucket",
            "b",
            "--age-threshold",
            "259200",
        ]);
        match &cli.command {
            Some(Commands::Prune {
                age_threshold,
                dry_run,
            }) => {
                let config = cli.stale_config(*age_threshold, *dry_run).unwrap();
                assert_eq!(config.age_threshold_secs, 259200);
                assert_eq!(config.prefixes, vec!["uploads/", "output/"]);
                assert_eq!(config.bucket, "b");
            }
            other => panic!("Expected Prune command, got: {:?}", other),
        }
    }

    #[test]
    fn test_cli_prune_flags() {
        let cli = parse(&[
            "bucket-monitor",
            "prune",
            "--bucket",
            "b",
            "--prefix",
            "uploads,output",
            "--interval",
            "60",
            "--age-threshold",
            "10",
            "--dry-run",
        ]);
        match &cli.command {
            Some(Commands::Prune {
                age_threshold,
                dry_run,
            }) => {
                assert_eq!(*age_threshold, 10);
                assert!(*dry_run);
                let config = cli.stale_config(*age_threshold, *dry_run).unwrap();
                assert_eq!(config.prefixes, vec!["uploads/", "output/"]);
                assert_eq!(config.interval_secs, 60);
                assert!(config.dry_run);
            }
            other => panic!("Expected Prune command, got: {:?}", other),
        }
    }

    #[test]
    fn test_cli_unknown_provider_is_config_error() {
        let cli = parse(&[
            "bucket-monitor",
            "--bucket",
            "b",
            "--cloud-provider",
            "azure",
        ]);
        let err = cli.upload_config().unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
        assert!(err.to_string().contains("cloud provider"));
    }

    #[test]
    fn test_cli_missing_bucket_is_config_error() {
        let mut cli = parse(&["bucket-monitor", "--bucket", "b"]);
        cli.bucket = None;
        let err = cli.upload_config().unwrap_err();
        assert!(err.to_string().contains("BUCKET"));
    }

    #[test]
    fn test_cli_rejects_unknown_job_type() {
        let result = Cli::try_parse_from(["bucket-monitor", "--job-type", "train"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_debug_flag() {
        let cli = parse(&["bucket-monitor", "--bucket", "b", "--debug"]);
        assert!(cli.debug);
    }
}
