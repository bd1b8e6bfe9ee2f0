use thiserror::Error;

/// Native error detail reported by a driver: its numeric code and message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{code}] {message}")]
pub struct DriverError {
    pub code: i32,
    pub message: String,
}

impl DriverError {
    /// Code used when the driver reports a failure without a native code.
    pub const UNKNOWN: i32 = -1;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SqlOffloadError {
    /// `open`/`connect` failed.
    #[error("Connection error: {0}")]
    ConnectionError(DriverError),

    /// A query, transaction-control call or result fetch failed on a live connection.
    #[error("Protocol error: {0}")]
    ProtocolError(DriverError),

    /// The connection was cancelled or closed before the outcome could be delivered.
    #[error("Operation cancelled")]
    CancellationError,

    #[error("Usage error: {0}")]
    UsageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Conversion error: {0}")]
    ConversionError(String),

    #[error("Batch statement {index} failed: {source}")]
    BatchError {
        index: usize,
        #[source]
        source: Box<SqlOffloadError>,
    },

    #[error("Worker error: {0}")]
    WorkerError(String),
}

impl SqlOffloadError {
    /// Native driver code carried by this error, if any.
    #[must_use]
    pub fn code(&self) -> Option<i32> {
        match self {
            SqlOffloadError::ConnectionError(err) | SqlOffloadError::ProtocolError(err) => {
                Some(err.code)
            }
            SqlOffloadError::BatchError { source, .. } => source.code(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SqlOffloadError::CancellationError)
    }

    pub(crate) fn usage(message: impl Into<String>) -> Self {
        SqlOffloadError::UsageError(message.into())
    }
}

pub type Result<T, E = SqlOffloadError> = std::result::Result<T, E>;
