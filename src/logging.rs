use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Size at which the log file is rotated (10 MB).
pub const LOG_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Number of rotated files kept next to the live one.
pub const LOG_BACKUPS: usize = 10;

// ---------------------------------------------------------------------------
// RotatingFileWriter
// ---------------------------------------------------------------------------

/// Appends to `path` and, once the file reaches `max_size` bytes, shifts it
/// to `path.1`, `path.1` to `path.2` and so on, dropping anything past
/// `backups`.
pub struct RotatingFileWriter {
    file: File,
    path: PathBuf,
    bytes_written: u64,
    max_size: u64,
    backups: usize,
}

impl RotatingFileWriter {
    /// Opens `path` in append mode. The byte count is seeded from the
    /// existing file so a restart does not reset the size budget.
    pub fn new(path: impl Into<PathBuf>, max_size: u64, backups: usize) -> std::io::Result<Self> {
        let path = path.into();
        let file = open_append(&path)?;
        let bytes_written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            file,
            path,
            bytes_written,
            max_size,
            backups,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        self.file.flush()?;

        if self.backups == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.bytes_written = 0;
            return Ok(());
        }

        let oldest = self.backup_path(self.backups);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }
        for index in (1..self.backups).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                std::fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        std::fs::rename(&self.path, self.backup_path(1))?;

        self.file = open_append(&self.path)?;
        self.bytes_written = 0;
        Ok(())
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.bytes_written > 0 && self.bytes_written + buf.len() as u64 > self.max_size {
            if let Err(e) = self.rotate() {
                // The tracing pipeline has nowhere else to report this.
                eprintln!(
                    "WARNING: rotating {} failed: {}. Log file may grow beyond {} bytes.",
                    self.path.display(),
                    e,
                    self.max_size
                );
            }
        }
        let n = self.file.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

/// `RUST_LOG` wins; otherwise `debug` or `info`.
fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }))
}

/// Install the global subscriber: stdout always, plus `log_file` when given.
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init_logging(debug: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let stdout_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(env_filter(debug))
            .with(stdout_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
        return Ok(None);
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let writer = RotatingFileWriter::new(path, LOG_MAX_BYTES, LOG_BACKUPS)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(writer);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter(debug))
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!("Logging to stdout and {}", path.display());
    Ok(Some(guard))
}
