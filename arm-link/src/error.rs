//! Error types for ArmLink

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// ArmLink error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error (open or configure)
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Path generation or trajectory file error
    #[error(transparent)]
    Path(#[from] arm_path::Error),

    /// Transport refused an operation (closed, injected failure)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid parameter passed to an operation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Device answered with an error token
    #[error("Device reported error: {0}")]
    Device(String),

    /// No recognized acknowledgment within the wait bound
    #[error("No acknowledgment after {timeout_ms} ms")]
    AckTimeout { timeout_ms: u64 },

    /// Streaming session aborted before all samples were dispatched
    #[error("Stream aborted after {sent}/{total} samples: {source}")]
    StreamAborted {
        sent: usize,
        total: usize,
        #[source]
        source: Box<Error>,
    },

    /// Session interrupted by the cancel flag
    #[error("Stream cancelled after {sent}/{total} samples")]
    Cancelled { sent: usize, total: usize },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Number of samples dispatched before a streaming failure
    pub fn samples_sent(&self) -> Option<usize> {
        match self {
            Error::StreamAborted { sent, .. } | Error::Cancelled { sent, .. } => Some(*sent),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
