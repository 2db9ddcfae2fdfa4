//! Error taxonomy for the detection pipeline.
//!
//! Every fallible operation in the crate returns [`Result`]. The variants map
//! one-to-one onto how the caller is expected to react:
//! - `Input` / `ConfigMismatch` abort the current run.
//! - `DegenerateData` is caught by the pipeline and turned into an empty result.
//! - `Persistence` is reported per alert insert and never poisons a pass.

use thiserror::Error;

use crate::logic::features::layout::LayoutMismatchError;

pub type Result<T> = std::result::Result<T, SentinelError>;

#[derive(Error, Debug)]
pub enum SentinelError {
    /// Malformed or missing capture / flow / feature source
    #[error("Input error: {0}")]
    Input(String),

    /// Scaler, model or feature schema disagree on shape or ordering
    #[error("Configuration mismatch: {0}")]
    ConfigMismatch(String),

    /// Zero packets or zero flows; callers treat this as a no-op
    #[error("Degenerate data: {0}")]
    DegenerateData(String),

    /// Alert store unreachable or rejected a write
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SentinelError {
    /// Whether this error must stop the current run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SentinelError::DegenerateData(_) | SentinelError::Persistence(_))
    }
}

impl From<rusqlite::Error> for SentinelError {
    fn from(err: rusqlite::Error) -> Self {
        SentinelError::Persistence(err.to_string())
    }
}

impl From<LayoutMismatchError> for SentinelError {
    fn from(err: LayoutMismatchError) -> Self {
        SentinelError::ConfigMismatch(err.to_string())
    }
}
