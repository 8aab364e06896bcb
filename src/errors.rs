use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<object_store::Error> for MonitorError {
    fn from(err: object_store::Error) -> Self {
        MonitorError::Storage(err.to_string())
    }
}

/// Failure classes of the key-value store. The class decides how
/// `RetryingStore` reacts: connection failures are retried forever, busy
/// failures a bounded number of times, everything else is returned as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Store busy: {0}")]
    Busy(String),

    #[error("Response error: {0}")]
    Response(String),

    #[error("Store failure: {0}")]
    Other(String),
}

impl StoreError {
    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
            || err.is_io_error()
        {
            return StoreError::Connection(err.to_string());
        }

        if err.code() == Some("BUSY") || err.kind() == redis::ErrorKind::BusyLoadingError {
            return StoreError::Busy(err.to_string());
        }

        match err.kind() {
            redis::ErrorKind::ResponseError
            | redis::ErrorKind::ExtensionError
            | redis::ErrorKind::TypeError => StoreError::Response(err.to_string()),
            _ => StoreError::Other(err.to_string()),
        }
    }
}

/// Why a filename did not yield a job.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Not a direct upload")]
    NotDirectUpload,

    #[error("Invalid job fields in '{0}'")]
    InvalidFields(String),

    #[error("Invalid benchmark count in '{0}'")]
    InvalidBenchmark(String),
}
