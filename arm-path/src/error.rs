//! Error types for ArmPath

use std::path::PathBuf;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// ArmPath error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Sampling rate must be strictly positive
    #[error("Invalid generation config: rate_hz must be > 0 (got {0})")]
    InvalidRate(u32),

    /// Total duration must be finite and non-negative
    #[error("Invalid generation config: total_time_ms must be >= 0 (got {0})")]
    InvalidDuration(f64),

    /// Duration times rate asks for more samples than a trajectory may hold
    #[error("Invalid generation config: {requested:.0} samples requested, at most {max} allowed")]
    TooManySamples { requested: f64, max: usize },

    /// Circle radius must be finite and non-negative
    #[error("Invalid generation config: radius must be >= 0 (got {0})")]
    InvalidRadius(f64),

    /// I/O error while reading or writing a trajectory file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Refused to replace an existing trajectory file
    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    /// File parsed, but not a single row was usable
    #[error("No usable samples in {}", .0.display())]
    NoUsableSamples(PathBuf),
}

impl Error {
    /// True for errors caused by invalid generation parameters
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::InvalidRate(_)
                | Error::InvalidDuration(_)
                | Error::TooManySamples { .. }
                | Error::InvalidRadius(_)
        )
    }
}
